//! Roster-Harvest: a polite sport-player profile harvester
//!
//! This crate repeatedly walks source sites (federation → team → player),
//! normalizes what it finds into canonical player records and merges them
//! into a SQLite store without losing previously known data.

pub mod config;
pub mod crawler;
pub mod normalize;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Roster-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Page renderer error: {0}")]
    Render(#[from] crawler::RenderError),

    #[error("Extraction error: {0}")]
    Extract(#[from] crawler::ExtractError),

    #[error("A crawl is already running")]
    AlreadyRunning,

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Roster-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlProgress, Orchestrator};
pub use normalize::{canonicalize, CanonicalRecord};
pub use state::{CrawlState, FetchStatus};
