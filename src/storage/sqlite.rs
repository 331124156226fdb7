//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::normalize::CanonicalRecord;
use crate::state::{CrawlState, FetchStatus};
use crate::storage::merge::{upsert_params, upsert_sql};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{FetchLedger, RecordStore, RunLog, StorageError, StorageResult};
use crate::storage::{
    parse_timestamp, timestamp_now, ErrorLogEntry, FetchLedgerEntry, FilterOptions, RecordPage,
    RecordQuery, RunRecord, StoredRecord,
};
use crate::HarvestError;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const RECORD_COLUMNS: &str = "id, record_url, name, age, weight, height, category, country, role, \
                              group_name, source_id, created_at, updated_at";

const RUN_COLUMNS: &str = "id, started_at, finished_at, status, processed_count, config_hash";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage").finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Opens or creates the database file at `path`
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Record counts per category, largest first
    pub fn count_by_category(&self) -> StorageResult<Vec<(String, u64)>> {
        self.grouped_counts("category", None)
    }

    /// The `limit` countries with the most records
    pub fn top_countries(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        self.grouped_counts("country", Some(limit))
    }

    /// Mean of all known ages
    pub fn average_age(&self) -> StorageResult<Option<f64>> {
        Ok(self
            .conn
            .query_row("SELECT AVG(age) FROM records WHERE age IS NOT NULL", [], |row| {
                row.get(0)
            })?)
    }

    fn grouped_counts(&self, column: &str, limit: Option<usize>) -> StorageResult<Vec<(String, u64)>> {
        let limit = limit.map_or(-1, |l| l as i64);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column}, COUNT(*) AS n FROM records
             WHERE {column} IS NOT NULL AND {column} != ''
             GROUP BY {column} ORDER BY n DESC, {column} ASC LIMIT ?1"
        ))?;

        let counts = stmt
            .query_map(params![limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn distinct(&self, column: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM records
             WHERE {column} IS NOT NULL AND {column} != '' ORDER BY {column}"
        ))?;

        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(values)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get(0)?,
        record: CanonicalRecord {
            record_url: row.get(1)?,
            name: row.get(2)?,
            age: row.get(3)?,
            weight: row.get(4)?,
            height: row.get(5)?,
            category: row.get(6)?,
            country: row.get(7)?,
            role: row.get(8)?,
            group: row.get(9)?,
            source_id: row.get(10)?,
        },
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        status: CrawlState::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(CrawlState::Failed),
        processed_count: row.get::<_, i64>(4)? as u64,
        config_hash: row.get(5)?,
    })
}

impl RecordStore for SqliteStorage {
    fn upsert_record(&mut self, record: &CanonicalRecord) -> StorageResult<bool> {
        let record_url = record
            .record_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(StorageError::MissingRecordKey)?;

        if record.name.trim().is_empty() {
            return Err(StorageError::MissingName(record_url.to_string()));
        }
        for (field, value) in [("category", &record.category), ("source", &record.source_id)] {
            if value.trim().is_empty() {
                return Err(StorageError::MissingField {
                    url: record_url.to_string(),
                    field,
                });
            }
        }

        let params = upsert_params(record_url, record, &timestamp_now());
        let changed = self.conn.execute(upsert_sql(), params_from_iter(params))?;

        Ok(changed > 0)
    }

    fn get_record(&self, record_url: &str) -> StorageResult<Option<StoredRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_url = ?1"),
                params![record_url],
                record_from_row,
            )
            .optional()?;

        Ok(record)
    }

    fn query_records(&self, query: &RecordQuery) -> StorageResult<RecordPage> {
        let (clause, mut params) = query.where_clause();
        let page = query.page();
        let per_page = query.per_page();

        let total_count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM records {clause}"),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(i64::from(per_page)));
        params.push(Value::Integer(i64::from(page - 1) * i64::from(per_page)));
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records {clause} {order} LIMIT ?{limit} OFFSET ?{offset}",
            order = query.order_clause(),
            limit = params.len() - 1,
            offset = params.len(),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(params.iter()), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordPage::new(records, total_count as u64, page, per_page))
    }

    fn filter_options(&self) -> StorageResult<FilterOptions> {
        Ok(FilterOptions {
            categories: self.distinct("category")?,
            countries: self.distinct("country")?,
            groups: self.distinct("group_name")?,
            roles: self.distinct("role")?,
            sources: self.distinct("source_id")?,
        })
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl FetchLedger for SqliteStorage {
    fn record_fetch(
        &mut self,
        url: &str,
        status: FetchStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let error = match status {
            FetchStatus::Success => None,
            FetchStatus::Failed => error,
        };

        self.conn.execute(
            "INSERT INTO fetch_ledger (url, last_status, last_error, fetched_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO UPDATE SET
                last_status = excluded.last_status,
                last_error = excluded.last_error,
                fetched_at = excluded.fetched_at",
            params![url, status.to_db_string(), error, timestamp_now()],
        )?;
        Ok(())
    }

    fn get_fetch_entry(&self, url: &str) -> StorageResult<Option<FetchLedgerEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT url, last_status, last_error, fetched_at FROM fetch_ledger WHERE url = ?1",
                params![url],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((url, status, last_error, fetched_at)) = row else {
            return Ok(None);
        };

        Ok(Some(FetchLedgerEntry {
            url,
            last_status: FetchStatus::from_db_string(&status).unwrap_or(FetchStatus::Failed),
            last_error,
            fetched_at: parse_timestamp(&fetched_at)?,
        }))
    }

    fn count_fetch_entries(&self, status: Option<FetchStatus>) -> StorageResult<u64> {
        let count: i64 = match status {
            Some(status) => self.conn.query_row(
                "SELECT COUNT(*) FROM fetch_ledger WHERE last_status = ?1",
                params![status.to_db_string()],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM fetch_ledger", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }
}

impl RunLog for SqliteStorage {
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, status, config_hash) VALUES (?1, ?2, ?3)",
            params![timestamp_now(), CrawlState::Running.to_db_string(), config_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        state: CrawlState,
        processed_count: u64,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, processed_count = ?3 WHERE id = ?4",
            params![
                state.to_db_string(),
                timestamp_now(),
                i64::try_from(processed_count).unwrap_or(i64::MAX),
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC LIMIT 1"),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn log_error(
        &mut self,
        run_id: Option<i64>,
        message: &str,
        url: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO error_log (run_id, message, url, logged_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, message, url, timestamp_now()],
        )?;
        Ok(())
    }

    fn recent_error_log(&self, limit: usize) -> StorageResult<Vec<ErrorLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, message, url, logged_at FROM error_log ORDER BY id DESC LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ErrorLogEntry {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    message: row.get(2)?,
                    url: row.get(3)?,
                    logged_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SortField;
    use chrono::{Duration, Utc};

    fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn record(url: &str, name: &str) -> CanonicalRecord {
        CanonicalRecord {
            record_url: Some(url.to_string()),
            name: name.to_string(),
            category: "Basketball".to_string(),
            source_id: "demo".to_string(),
            ..Default::default()
        }
    }

    const URL: &str = "https://example.com/player/1";

    #[test]
    fn test_insert_then_get() {
        let mut storage = storage();
        let mut full = record(URL, "Jane Doe");
        full.age = Some(25);
        full.weight = Some("90".into());

        assert!(storage.upsert_record(&full).unwrap());

        let stored = storage.get_record(URL).unwrap().unwrap();
        assert_eq!(stored.record, full);
        assert_eq!(stored.created_at, stored.updated_at);
        assert_eq!(storage.count_records().unwrap(), 1);
    }

    #[test]
    fn test_partial_upsert_never_erases() {
        let mut storage = storage();
        let mut first = record(URL, "Jane Doe");
        first.age = Some(25);
        first.weight = Some("90".into());
        storage.upsert_record(&first).unwrap();

        let mut second = record(URL, "Jane Doe");
        second.weight = Some("95".into());
        second.height = Some("6'5\"".into());
        storage.upsert_record(&second).unwrap();

        let stored = storage.get_record(URL).unwrap().unwrap().record;
        assert_eq!(stored.age, Some(25));
        assert_eq!(stored.weight.as_deref(), Some("95"));
        assert_eq!(stored.height.as_deref(), Some("6'5\""));
        assert_eq!(storage.count_records().unwrap(), 1);
    }

    #[test]
    fn test_identical_upsert_is_idempotent() {
        let mut storage = storage();
        let mut full = record(URL, "Jane Doe");
        full.age = Some(25);
        full.country = Some("Canada".into());
        full.group = Some("Hawks".into());

        storage.upsert_record(&full).unwrap();
        let first = storage.get_record(URL).unwrap().unwrap();
        assert!(storage.upsert_record(&full).unwrap());
        let second = storage.get_record(URL).unwrap().unwrap();

        assert_eq!(first.record, second.record);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_identity_fields_overwrite() {
        let mut storage = storage();
        let mut first = record(URL, "Jane Doe");
        first.group = Some("Hawks".into());
        first.role = Some("Guard".into());
        storage.upsert_record(&first).unwrap();

        let mut second = record(URL, "Jane A. Doe");
        second.source_id = "other".into();
        storage.upsert_record(&second).unwrap();

        let stored = storage.get_record(URL).unwrap().unwrap().record;
        assert_eq!(stored.name, "Jane A. Doe");
        assert_eq!(stored.source_id, "other");
        assert_eq!(stored.group, None);
        assert_eq!(stored.role.as_deref(), Some("Guard"));
    }

    #[test]
    fn test_rejects_missing_key() {
        let mut storage = storage();
        let mut keyless = record(URL, "X");
        keyless.record_url = None;
        assert!(matches!(
            storage.upsert_record(&keyless),
            Err(StorageError::MissingRecordKey)
        ));

        keyless.record_url = Some("  ".into());
        assert!(storage.upsert_record(&keyless).is_err());
        assert!(matches!(
            storage.upsert_record(&record(URL, " ")),
            Err(StorageError::MissingName(_))
        ));
        assert_eq!(storage.count_records().unwrap(), 0);
    }

    #[test]
    fn test_rejects_missing_category_or_source() {
        let mut storage = storage();

        let mut uncategorized = record(URL, "Jane Doe");
        uncategorized.category = String::new();
        assert!(matches!(
            storage.upsert_record(&uncategorized),
            Err(StorageError::MissingField { field: "category", .. })
        ));

        let mut sourceless = record(URL, "Jane Doe");
        sourceless.source_id = " ".into();
        assert!(matches!(
            storage.upsert_record(&sourceless),
            Err(StorageError::MissingField { field: "source", .. })
        ));
        assert_eq!(storage.count_records().unwrap(), 0);
    }

    #[test]
    fn test_sort_by_weight_and_height_is_numeric() {
        let mut storage = storage();
        for (id, weight, height) in [("a", "100", "6'10\""), ("b", "95", "6'2\""), ("c", "210", "5'11\"")] {
            let mut r = record(&format!("https://example.com/p/{}", id), id);
            r.weight = Some(weight.into());
            r.height = Some(height.into());
            storage.upsert_record(&r).unwrap();
        }

        let names = |sort_by| -> Vec<String> {
            storage
                .query_records(&RecordQuery {
                    sort_by,
                    ..Default::default()
                })
                .unwrap()
                .records
                .into_iter()
                .map(|r| r.record.name)
                .collect()
        };

        assert_eq!(names(SortField::Weight), ["b", "a", "c"]);
        assert_eq!(names(SortField::Height), ["c", "b", "a"]);
        assert_eq!(names(SortField::RecordUrl), ["a", "b", "c"]);
    }

    fn seed(storage: &mut SqliteStorage) {
        let rows = [
            ("a", "Alice Smith", Some(22), "Canada", "Hawks"),
            ("b", "Bob Jones", Some(31), "USA", "Owls"),
            ("c", "Carla Smithers", Some(27), "Canada", "Owls"),
            ("d", "Dan Brown", None, "Japan", "Hawks"),
        ];
        for (id, name, age, country, group) in rows {
            let mut r = record(&format!("https://example.com/p/{}", id), name);
            r.age = age;
            r.country = Some(country.into());
            r.group = Some(group.into());
            storage.upsert_record(&r).unwrap();
        }
    }

    #[test]
    fn test_query_filters() {
        let mut storage = storage();
        seed(&mut storage);

        let page = storage
            .query_records(&RecordQuery {
                search: Some("SMITH".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total_count, 2);

        let page = storage
            .query_records(&RecordQuery {
                country: Some("Canada".into()),
                min_age: Some(25),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].record.name, "Carla Smithers");
    }

    #[test]
    fn test_query_sort_and_paginate() {
        let mut storage = storage();
        seed(&mut storage);

        let query = RecordQuery {
            sort_by: crate::storage::SortField::Age,
            order: crate::storage::SortOrder::Desc,
            per_page: 2,
            page: 1,
            ..Default::default()
        };
        let first = storage.query_records(&query).unwrap();
        assert_eq!(first.total_count, 4);
        assert_eq!(first.total_pages, 2);
        assert!(first.has_next);
        assert!(!first.has_prev);
        assert_eq!(first.records[0].record.name, "Bob Jones");

        let second = storage
            .query_records(&RecordQuery { page: 2, ..query })
            .unwrap();
        assert_eq!(second.records.len(), 2);
        assert!(!second.has_next);
        assert!(second.has_prev);
    }

    #[test]
    fn test_filter_options_and_stats() {
        let mut storage = storage();
        seed(&mut storage);

        let options = storage.filter_options().unwrap();
        assert_eq!(options.countries, ["Canada", "Japan", "USA"]);
        assert_eq!(options.groups, ["Hawks", "Owls"]);
        assert_eq!(options.sources, ["demo"]);
        assert!(options.roles.is_empty());

        assert_eq!(
            storage.top_countries(1).unwrap(),
            vec![("Canada".to_string(), 2)]
        );
        assert_eq!(
            storage.count_by_category().unwrap(),
            vec![("Basketball".to_string(), 4)]
        );
        let avg = storage.average_age().unwrap().unwrap();
        assert!((avg - 80.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ledger_single_row_per_url() {
        let mut storage = storage();
        let outcomes = [
            FetchStatus::Failed,
            FetchStatus::Success,
            FetchStatus::Failed,
            FetchStatus::Success,
            FetchStatus::Failed,
        ];
        for status in outcomes {
            storage.record_fetch(URL, status, Some("HTTP 500")).unwrap();
        }

        assert_eq!(storage.count_fetch_entries(None).unwrap(), 1);
        let entry = storage.get_fetch_entry(URL).unwrap().unwrap();
        assert_eq!(entry.last_status, FetchStatus::Failed);
        assert_eq!(entry.last_error.as_deref(), Some("HTTP 500"));

        storage.record_fetch(URL, FetchStatus::Success, None).unwrap();
        let entry = storage.get_fetch_entry(URL).unwrap().unwrap();
        assert_eq!(entry.last_status, FetchStatus::Success);
        assert_eq!(entry.last_error, None);
        assert_eq!(storage.count_fetch_entries(Some(FetchStatus::Failed)).unwrap(), 0);
    }

    #[test]
    fn test_fetched_successfully_since() {
        let mut storage = storage();
        let hour_ago = Utc::now() - Duration::hours(1);

        assert!(!storage.fetched_successfully_since(URL, hour_ago).unwrap());

        storage.record_fetch(URL, FetchStatus::Success, None).unwrap();
        assert!(storage.fetched_successfully_since(URL, hour_ago).unwrap());
        assert!(!storage
            .fetched_successfully_since(URL, Utc::now() + Duration::hours(1))
            .unwrap());

        storage.record_fetch(URL, FetchStatus::Failed, Some("timeout")).unwrap();
        assert!(!storage.fetched_successfully_since(URL, hour_ago).unwrap());
    }

    #[test]
    fn test_run_log() {
        let mut storage = storage();
        assert!(storage.latest_run().unwrap().is_none());

        let run_id = storage.create_run("abc123").unwrap();
        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, CrawlState::Running);
        assert!(run.finished_at.is_none());

        storage.finish_run(run_id, CrawlState::Completed, 12).unwrap();
        let run = storage.latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, CrawlState::Completed);
        assert_eq!(run.processed_count, 12);
        assert!(run.finished_at.is_some());

        assert!(matches!(
            storage.finish_run(999, CrawlState::Failed, 0),
            Err(StorageError::RunNotFound(999))
        ));
    }

    #[test]
    fn test_error_log() {
        let mut storage = storage();
        let run_id = storage.create_run("abc").unwrap();
        for i in 0..3 {
            storage
                .log_error(Some(run_id), &format!("failure {}", i), Some(URL))
                .unwrap();
        }
        storage.log_error(None, "no url", None).unwrap();

        let entries = storage.recent_error_log(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "no url");
        assert_eq!(entries[0].url, None);
        assert_eq!(entries[1].message, "failure 2");
        assert_eq!(entries[1].run_id, Some(run_id));
    }

    #[test]
    fn test_on_disk_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.db");
        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.upsert_record(&record(URL, "Jane Doe")).unwrap();
        }
        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.count_records().unwrap(), 1);
    }
}
