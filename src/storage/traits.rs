//! Storage traits and error types

use crate::normalize::CanonicalRecord;
use crate::state::{CrawlState, FetchStatus};
use crate::storage::{
    ErrorLogEntry, FetchLedgerEntry, FilterOptions, RecordPage, RecordQuery, RunRecord,
    StoredRecord,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// A record without a record URL cannot be deduplicated or updated later
    #[error("Record has no record URL")]
    MissingRecordKey,

    #[error("Record {0} has no name")]
    MissingName(String),

    #[error("Record {url} has no {field}")]
    MissingField { url: String, field: &'static str },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Merge-upsert store of canonical records
pub trait RecordStore {
    /// Merges a record into the store under its record URL
    ///
    /// Returns `Ok(true)` when the write succeeded, including a merge that
    /// changed nothing but `updated_at`. A record without a URL or name is
    /// refused with an error before the store is touched.
    fn upsert_record(&mut self, record: &CanonicalRecord) -> StorageResult<bool>;

    /// Gets a record by its record URL
    fn get_record(&self, record_url: &str) -> StorageResult<Option<StoredRecord>>;

    /// Runs a filtered, sorted, paginated query
    fn query_records(&self, query: &RecordQuery) -> StorageResult<RecordPage>;

    /// Distinct non-empty values of each filterable column, sorted
    fn filter_options(&self) -> StorageResult<FilterOptions>;

    fn count_records(&self) -> StorageResult<u64>;
}

/// Last outcome of fetching each URL
pub trait FetchLedger {
    /// Upserts the ledger entry for `url`, overwriting status, error and time
    fn record_fetch(
        &mut self,
        url: &str,
        status: FetchStatus,
        error: Option<&str>,
    ) -> StorageResult<()>;

    fn get_fetch_entry(&self, url: &str) -> StorageResult<Option<FetchLedgerEntry>>;

    /// Counts entries, optionally only those with the given status
    fn count_fetch_entries(&self, status: Option<FetchStatus>) -> StorageResult<u64>;

    /// Returns true if `url` was last fetched successfully at or after `since`
    fn fetched_successfully_since(&self, url: &str, since: DateTime<Utc>) -> StorageResult<bool> {
        Ok(self
            .get_fetch_entry(url)?
            .is_some_and(|entry| entry.last_status == FetchStatus::Success && entry.fetched_at >= since))
    }
}

/// Persistent log of crawl runs and their failures
pub trait RunLog {
    /// Creates a new running crawl run and returns its id
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records a run's final state and processed count
    fn finish_run(
        &mut self,
        run_id: i64,
        state: CrawlState,
        processed_count: u64,
    ) -> StorageResult<()>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Appends a failure to the error log
    fn log_error(&mut self, run_id: Option<i64>, message: &str, url: Option<&str>)
        -> StorageResult<()>;

    /// Most recent error log entries, newest first
    fn recent_error_log(&self, limit: usize) -> StorageResult<Vec<ErrorLogEntry>>;
}
