//! Configuration module for Roster-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use roster_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Fetch attempts per URL: {}", config.crawler.max_retries);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, FieldSelectors, OutputConfig, SelectorConfig, SourceConfig, UnitEntry,
    UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::split_selector;
