//! Crawler module for page fetching and traversal
//!
//! This module contains the ingestion pipeline core, including:
//! - Page rendering and fetching with bounded, backed-off retries
//! - The extractor contract and a configuration-driven extractor
//! - Live progress tracking
//! - Orchestration of crawl runs with cooperative cancellation

mod coordinator;
mod extractor;
mod fetcher;
mod progress;
mod selector;

pub use coordinator::{Orchestrator, RendererFactory};
pub use extractor::{CrawlUnit, ExtractError, Extraction, Extractor, PageKind, RawRecord};
pub use fetcher::{
    user_agent, FetchOutcome, HttpRenderer, PageFetcher, PageRenderer, RenderError, RetryPolicy,
};
pub use progress::{CrawlProgress, ProgressHandle, RECENT_ERROR_CAPACITY};
pub use selector::SelectorExtractor;

use crate::config::Config;
use crate::state::CrawlState;
use crate::storage::SharedStorage;
use crate::HarvestError;

/// Runs one complete crawl of every configured source
///
/// This is the main library entry point. It builds the orchestrator from the
/// configuration and runs it to completion on the current task.
///
/// # Returns
///
/// * `Ok(CrawlState)` - The run's final state (`Completed`, `Cancelled` or `Failed`)
/// * `Err(HarvestError)` - A source's selectors could not be compiled
pub async fn crawl(
    config: &Config,
    storage: SharedStorage,
    config_hash: &str,
) -> Result<CrawlState, HarvestError> {
    Orchestrator::from_config(config, storage, config_hash)?
        .run()
        .await
}
