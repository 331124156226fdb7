//! The extractor contract
//!
//! An extractor turns the raw content of one page into partial records and
//! child pages to visit. Extractors are pure: they never fetch, sleep or
//! write, so the orchestrator can treat any error as a failure of the one
//! unit of work that produced the page.

use crate::normalize::{is_abbreviation, is_centimetres};
use thiserror::Error;
use url::Url;

/// Errors an extractor can report for a page
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The page does not contain the structure the extractor expects
    #[error("expected structure not found on {url}: {what}")]
    MissingStructure { url: String, what: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid selector: {0}")]
    Selector(String),
}

/// Level of the discovery hierarchy a page belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Top-level index (federation, country, league)
    Index,
    /// Group page (team roster)
    Group,
    /// Leaf page (one player)
    Leaf,
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageKind::Index => write!(f, "index"),
            PageKind::Group => write!(f, "group"),
            PageKind::Leaf => write!(f, "leaf"),
        }
    }
}

/// A labelled page to visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlUnit {
    pub label: String,
    pub url: String,
}

impl CrawlUnit {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// A partial record as read from a page, before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub record_url: Option<String>,
    pub name: Option<String>,
    pub age: Option<String>,
    pub birth_date: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub role: Option<String>,
    pub country: Option<String>,
    pub group: Option<String>,
}

impl RawRecord {
    /// Fills this roster record's gaps from the player's own page
    ///
    /// Absent fields are taken from `detail`. A height still written in
    /// centimetres and an abbreviated role are replaced as well, since the
    /// detail page usually carries the fuller form. The record URL and group
    /// always stay as the roster saw them.
    pub fn absorb(&mut self, detail: RawRecord) {
        fill(&mut self.name, detail.name);
        fill(&mut self.age, detail.age);
        fill(&mut self.birth_date, detail.birth_date);
        fill(&mut self.weight, detail.weight);
        fill(&mut self.country, detail.country);

        if self.height.as_deref().map_or(true, is_centimetres) {
            replace_with(&mut self.height, detail.height);
        }
        if self.role.as_deref().map_or(true, is_abbreviation) {
            replace_with(&mut self.role, detail.role);
        }
        fill(&mut self.record_url, detail.record_url);
    }

    /// Returns true if the record carries a non-empty name
    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().map_or(true, |s| s.trim().is_empty()) {
        replace_with(slot, value);
    }
}

fn replace_with(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *slot = Some(value);
    }
}

/// What an extractor found on one page
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Inline partial records
    pub records: Vec<RawRecord>,
    /// Pages one level further down
    pub children: Vec<CrawlUnit>,
}

/// Source-specific page extraction
pub trait Extractor: Send + Sync {
    /// Identifier stored on every record from this source
    fn source_id(&self) -> &str;

    /// Sport or discipline of every record from this source
    fn category(&self) -> &str;

    /// Top-level index pages to start from
    fn top_level_units(&self) -> Vec<CrawlUnit>;

    /// Reads one page of the given kind
    ///
    /// Index pages yield groups as children; group pages yield inline records
    /// and/or leaf pages; leaf pages yield at most one record.
    fn extract(&self, kind: PageKind, content: &str, url: &Url) -> Result<Extraction, ExtractError>;
}
