//! Database schema definitions
//!
//! Records and ledger entries are keyed by URL with a UNIQUE constraint, so
//! every write is an atomic upsert under "last write wins per key".

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested player records, merged by record URL
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    age INTEGER,
    weight TEXT,
    height TEXT,
    category TEXT NOT NULL,
    country TEXT,
    role TEXT,
    group_name TEXT,
    source_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_name ON records(name);
CREATE INDEX IF NOT EXISTS idx_records_country ON records(country);
CREATE INDEX IF NOT EXISTS idx_records_group ON records(group_name);
CREATE INDEX IF NOT EXISTS idx_records_source ON records(source_id);

-- Last outcome of fetching each distinct URL
CREATE TABLE IF NOT EXISTS fetch_ledger (
    url TEXT PRIMARY KEY,
    last_status TEXT NOT NULL,
    last_error TEXT,
    fetched_at TEXT NOT NULL
);

-- One row per crawl run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    processed_count INTEGER NOT NULL DEFAULT 0,
    config_hash TEXT NOT NULL
);

-- Every failure reported during a run
CREATE TABLE IF NOT EXISTS error_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER REFERENCES runs(id),
    message TEXT NOT NULL,
    url TEXT,
    logged_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_error_log_run ON error_log(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
