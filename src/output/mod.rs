//! Output module for reporting on harvested data
//!
//! This module handles:
//! - Loading and printing store statistics
//! - Rendering query results as JSON

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::storage::{RecordPage, RecordQuery, RecordStore};
use crate::HarvestError;

/// Runs a query and renders the resulting page as pretty-printed JSON
pub fn query_json<S: RecordStore>(storage: &S, query: &RecordQuery) -> Result<String, HarvestError> {
    let page: RecordPage = storage.query_records(query)?;
    serde_json::to_string_pretty(&page)
        .map_err(|e| HarvestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
