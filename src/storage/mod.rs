//! Storage module for harvested records and crawl bookkeeping
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Merge-upserts of canonical records
//! - The fetch ledger (last outcome per URL)
//! - Run tracking and the persistent error log

mod merge;
mod query;
mod schema;
mod sqlite;
mod traits;

pub use merge::{upsert_params, upsert_sql, MergeRule, RecordColumn};
pub use query::{
    FilterOptions, DEFAULT_PER_PAGE, MAX_PER_PAGE, RecordPage, RecordQuery, SortField, SortOrder,
};
pub use sqlite::SqliteStorage;
pub use traits::{FetchLedger, RecordStore, RunLog, StorageError, StorageResult};

use crate::normalize::CanonicalRecord;
use crate::state::{CrawlState, FetchStatus};
use crate::HarvestError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between the crawl worker and its observers
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens (or creates) the database at `path`
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Wraps a storage for sharing across tasks
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, reporting a poisoned lock as an error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Current time in the fixed-width form stored in every timestamp column
pub(crate) fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(text: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp(text.to_string()))
}

/// A record as stored, with its bookkeeping columns
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: CanonicalRecord,
    pub created_at: String,
    pub updated_at: String,
}

/// One row of the fetch ledger
#[derive(Debug, Clone, PartialEq)]
pub struct FetchLedgerEntry {
    pub url: String,
    pub last_status: FetchStatus,
    pub last_error: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Represents a crawl run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: CrawlState,
    pub processed_count: u64,
    pub config_hash: String,
}

/// A persisted failure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorLogEntry {
    pub id: i64,
    pub run_id: Option<i64>,
    pub message: String,
    pub url: Option<String>,
    pub logged_at: String,
}
