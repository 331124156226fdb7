//! Statistics over the harvested records
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::state::FetchStatus;
use crate::storage::{FetchLedger, RecordStore, RunLog, RunRecord, SqliteStorage};
use crate::HarvestError;
use serde::Serialize;

/// Number of countries listed in the statistics
pub const TOP_COUNTRIES: usize = 10;

/// Harvest statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct HarvestStatistics {
    /// Total number of stored records
    pub total_records: u64,

    /// Record counts per category, largest first
    pub records_by_category: Vec<(String, u64)>,

    pub distinct_countries: usize,
    pub distinct_groups: usize,
    pub distinct_roles: usize,

    /// Mean known age, rounded to one decimal
    pub average_age: Option<f64>,

    /// Countries with the most records, largest first
    pub top_countries: Vec<(String, u64)>,

    /// Ledger entries whose last fetch succeeded
    pub fetched_ok: u64,

    /// Ledger entries whose last fetch failed
    pub fetch_failed: u64,

    pub last_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &SqliteStorage) -> Result<HarvestStatistics, HarvestError> {
    let options = storage.filter_options()?;

    Ok(HarvestStatistics {
        total_records: storage.count_records()?,
        records_by_category: storage.count_by_category()?,
        distinct_countries: options.countries.len(),
        distinct_groups: options.groups.len(),
        distinct_roles: options.roles.len(),
        average_age: storage.average_age()?.map(|avg| (avg * 10.0).round() / 10.0),
        top_countries: storage.top_countries(TOP_COUNTRIES)?,
        fetched_ok: storage.count_fetch_entries(Some(FetchStatus::Success))?,
        fetch_failed: storage.count_fetch_entries(Some(FetchStatus::Failed))?,
        last_run: storage.latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!("  Countries: {}", stats.distinct_countries);
    println!("  Groups: {}", stats.distinct_groups);
    println!("  Roles: {}", stats.distinct_roles);
    match stats.average_age {
        Some(age) => println!("  Average age: {:.1}", age),
        None => println!("  Average age: n/a"),
    }
    println!();

    if !stats.records_by_category.is_empty() {
        println!("Records by Category:");
        for (category, count) in &stats.records_by_category {
            println!("  {}: {} ({:.1}%)", category, count, percentage(*count, stats.total_records));
        }
        println!();
    }

    if !stats.top_countries.is_empty() {
        println!("Top Countries:");
        for (country, count) in &stats.top_countries {
            println!("  {}: {}", country, count);
        }
        println!();
    }

    let fetched = stats.fetched_ok + stats.fetch_failed;
    println!("Fetch Ledger:");
    println!("  URLs fetched: {}", fetched);
    println!(
        "  Last fetch failed: {} ({:.1}%)",
        stats.fetch_failed,
        percentage(stats.fetch_failed, fetched)
    );

    if let Some(run) = &stats.last_run {
        println!();
        println!("Last Run (#{}):", run.id);
        println!("  Status: {}", run.status);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Records processed: {}", run.processed_count);
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
