//! Field-level merge policy for record upserts
//!
//! Every stored column of a record is classified once here, and the upsert
//! statement is generated from that classification:
//!
//! | Rule | Columns | On conflict |
//! |------|---------|-------------|
//! | Overwrite | name, category, group, source | new value replaces the stored one |
//! | Coalesce | age, weight, height, country, role | stored value kept unless the new one is non-null |
//!
//! `updated_at` is refreshed on every upsert; `created_at` is written once.

use crate::normalize::CanonicalRecord;
use rusqlite::types::Value;
use std::sync::LazyLock;

/// How a column reconciles a new observation with the stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// The new observation is authoritative, even when null
    Overwrite,
    /// A null observation never erases stored data
    Coalesce,
}

/// A merged column of the `records` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordColumn {
    Name,
    Age,
    Weight,
    Height,
    Category,
    Country,
    Role,
    Group,
    SourceId,
}

impl RecordColumn {
    pub const ALL: [RecordColumn; 9] = [
        Self::Name,
        Self::Age,
        Self::Weight,
        Self::Height,
        Self::Category,
        Self::Country,
        Self::Role,
        Self::Group,
        Self::SourceId,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Weight => "weight",
            Self::Height => "height",
            Self::Category => "category",
            Self::Country => "country",
            Self::Role => "role",
            Self::Group => "group_name",
            Self::SourceId => "source_id",
        }
    }

    pub fn rule(self) -> MergeRule {
        match self {
            Self::Name | Self::Category | Self::Group | Self::SourceId => MergeRule::Overwrite,
            Self::Age | Self::Weight | Self::Height | Self::Country | Self::Role => {
                MergeRule::Coalesce
            }
        }
    }

    /// The value this record contributes to the column
    ///
    /// Empty strings count as null.
    pub fn value(self, record: &CanonicalRecord) -> Value {
        match self {
            Self::Name => text(Some(&record.name)),
            Self::Age => record.age.map_or(Value::Null, |a| Value::Integer(i64::from(a))),
            Self::Weight => text(record.weight.as_ref()),
            Self::Height => text(record.height.as_ref()),
            Self::Category => text(Some(&record.category)),
            Self::Country => text(record.country.as_ref()),
            Self::Role => text(record.role.as_ref()),
            Self::Group => text(record.group.as_ref()),
            Self::SourceId => text(Some(&record.source_id)),
        }
    }

    fn assignment(self) -> String {
        let column = self.column_name();
        match self.rule() {
            MergeRule::Overwrite => format!("{column} = excluded.{column}"),
            MergeRule::Coalesce => format!("{column} = COALESCE(excluded.{column}, records.{column})"),
        }
    }
}

fn text(value: Option<&String>) -> Value {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Value::Text(v.to_string()),
        _ => Value::Null,
    }
}

static UPSERT_SQL: LazyLock<String> = LazyLock::new(|| {
    let columns: Vec<&str> = RecordColumn::ALL.iter().map(|c| c.column_name()).collect();
    // ?1 is the record URL, ?2..?10 the merged columns, ?11 the timestamp
    let placeholders: Vec<String> = (2..=RecordColumn::ALL.len() + 1)
        .map(|i| format!("?{i}"))
        .collect();
    let timestamp = format!("?{}", RecordColumn::ALL.len() + 2);
    let assignments: Vec<String> = RecordColumn::ALL.iter().map(|c| c.assignment()).collect();

    format!(
        "INSERT INTO records (record_url, {columns}, created_at, updated_at)
         VALUES (?1, {placeholders}, {timestamp}, {timestamp})
         ON CONFLICT(record_url) DO UPDATE SET {assignments}, updated_at = excluded.updated_at",
        columns = columns.join(", "),
        placeholders = placeholders.join(", "),
        timestamp = timestamp,
        assignments = assignments.join(", "),
    )
});

/// The merge-upsert statement for the `records` table
pub fn upsert_sql() -> &'static str {
    UPSERT_SQL.as_str()
}

/// Positional parameters for [`upsert_sql`]
pub fn upsert_params(record_url: &str, record: &CanonicalRecord, now: &str) -> Vec<Value> {
    let mut params = Vec::with_capacity(RecordColumn::ALL.len() + 2);
    params.push(Value::Text(record_url.to_string()));
    params.extend(RecordColumn::ALL.iter().map(|c| c.value(record)));
    params.push(Value::Text(now.to_string()));
    params
}
