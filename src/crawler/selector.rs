//! Configuration-driven extractor
//!
//! `SelectorExtractor` reads a source's pages with the CSS selectors given in
//! its `[[source]]` block, so adding a site with the usual
//! index → roster → player layout needs no code.

use super::extractor::{CrawlUnit, ExtractError, Extraction, Extractor, PageKind, RawRecord};
use crate::config::{split_selector, FieldSelectors, SourceConfig};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A compiled field selector, optionally reading an attribute
#[derive(Debug)]
struct FieldSpec {
    selector: Selector,
    attr: Option<String>,
}

impl FieldSpec {
    fn parse(spec: &str) -> Result<Self, ExtractError> {
        let (css, attr) = split_selector(spec);
        Ok(Self {
            selector: compile(css)?,
            attr: attr.map(str::to_string),
        })
    }

    /// Reads the first non-empty match below `scope`
    fn read(&self, scope: ElementRef<'_>) -> Option<String> {
        scope.select(&self.selector).find_map(|element| {
            let value = match &self.attr {
                Some(attr) => element.value().attr(attr).map(collapse)?,
                None => collapse(&element.text().collect::<String>()),
            };
            (!value.is_empty()).then_some(value)
        })
    }
}

/// Compiled selectors for every field of a record
#[derive(Debug, Default)]
struct FieldPlan {
    name: Option<FieldSpec>,
    link: Option<FieldSpec>,
    age: Option<FieldSpec>,
    birth_date: Option<FieldSpec>,
    weight: Option<FieldSpec>,
    height: Option<FieldSpec>,
    role: Option<FieldSpec>,
    country: Option<FieldSpec>,
}

impl FieldPlan {
    fn compile(fields: &FieldSelectors) -> Result<Self, ExtractError> {
        let spec = |s: &Option<String>| s.as_deref().map(FieldSpec::parse).transpose();
        Ok(Self {
            name: spec(&fields.name)?,
            link: spec(&fields.link)?,
            age: spec(&fields.age)?,
            birth_date: spec(&fields.birth_date)?,
            weight: spec(&fields.weight)?,
            height: spec(&fields.height)?,
            role: spec(&fields.role)?,
            country: spec(&fields.country)?,
        })
    }

    fn read(&self, scope: ElementRef<'_>, base_url: &Url) -> RawRecord {
        let field = |spec: &Option<FieldSpec>| spec.as_ref().and_then(|s| s.read(scope));
        RawRecord {
            record_url: field(&self.link).and_then(|href| resolve_link(&href, base_url)),
            name: field(&self.name),
            age: field(&self.age),
            birth_date: field(&self.birth_date),
            weight: field(&self.weight),
            height: field(&self.height),
            role: field(&self.role),
            country: field(&self.country),
            group: None,
        }
    }
}

/// Extractor driven by a source's configured CSS selectors
#[derive(Debug)]
pub struct SelectorExtractor {
    source_id: String,
    category: String,
    units: Vec<CrawlUnit>,
    group_link: Selector,
    record_row: Option<Selector>,
    leaf_link: Option<Selector>,
    row: FieldPlan,
    detail: FieldPlan,
}

impl SelectorExtractor {
    /// Compiles the selectors of one configured source
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Selector` if any selector fails to parse.
    pub fn new(source: &SourceConfig) -> Result<Self, ExtractError> {
        let selectors = &source.selectors;
        Ok(Self {
            source_id: source.id.clone(),
            category: source.category.clone(),
            units: source
                .units
                .iter()
                .map(|u| CrawlUnit::new(u.label.clone(), u.url.clone()))
                .collect(),
            group_link: compile(&selectors.group_link)?,
            record_row: selectors.record_row.as_deref().map(compile).transpose()?,
            leaf_link: selectors.leaf_link.as_deref().map(compile).transpose()?,
            row: FieldPlan::compile(&selectors.row)?,
            detail: FieldPlan::compile(&selectors.detail)?,
        })
    }

    fn extract_index(&self, document: &Html, url: &Url) -> Result<Extraction, ExtractError> {
        let children = collect_links(document, &self.group_link, url);
        if children.is_empty() {
            return Err(missing(url, "group links"));
        }
        Ok(Extraction {
            records: Vec::new(),
            children,
        })
    }

    fn extract_group(&self, document: &Html, url: &Url) -> Result<Extraction, ExtractError> {
        let records: Vec<RawRecord> = match &self.record_row {
            Some(row) => document
                .select(row)
                .map(|element| self.row.read(element, url))
                // Header and spacer rows carry neither a name nor a link
                .filter(|record| record.has_name() || record.record_url.is_some())
                .collect(),
            None => Vec::new(),
        };

        let children = match &self.leaf_link {
            Some(selector) => collect_links(document, selector, url),
            None => Vec::new(),
        };

        if records.is_empty() && children.is_empty() {
            return Err(missing(url, "record rows or leaf links"));
        }
        Ok(Extraction { records, children })
    }

    fn extract_leaf(&self, document: &Html, url: &Url) -> Result<Extraction, ExtractError> {
        let mut record = self.detail.read(document.root_element(), url);
        if record == RawRecord::default() {
            return Err(missing(url, "player details"));
        }
        record.record_url = Some(url.to_string());

        Ok(Extraction {
            records: vec![record],
            children: Vec::new(),
        })
    }
}

impl Extractor for SelectorExtractor {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn top_level_units(&self) -> Vec<CrawlUnit> {
        self.units.clone()
    }

    fn extract(&self, kind: PageKind, content: &str, url: &Url) -> Result<Extraction, ExtractError> {
        let document = Html::parse_document(content);
        match kind {
            PageKind::Index => self.extract_index(&document, url),
            PageKind::Group => self.extract_group(&document, url),
            PageKind::Leaf => self.extract_leaf(&document, url),
        }
    }
}

fn compile(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector(format!("'{}': {:?}", css, e)))
}

fn missing(url: &Url, what: &str) -> ExtractError {
    ExtractError::MissingStructure {
        url: url.to_string(),
        what: what.to_string(),
    }
}

/// Collects resolved, de-duplicated links with their text as label
fn collect_links(document: &Html, selector: &Selector, base_url: &Url) -> Vec<CrawlUnit> {
    let mut seen = HashSet::new();
    document
        .select(selector)
        .filter_map(|element| {
            let url = resolve_link(element.value().attr("href")?, base_url)?;
            let label = collapse(&element.text().collect::<String>());
            let label = if label.is_empty() { url.clone() } else { label };
            Some(CrawlUnit::new(label, url))
        })
        .filter(|unit| seen.insert(unit.url.clone()))
        .collect()
}

/// Resolves a link href to an absolute HTTP(S) URL
///
/// `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only links are dropped.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
