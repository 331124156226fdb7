//! Filtered, sorted and paginated record queries

use super::StoredRecord;
use rusqlite::types::Value;
use serde::Serialize;
use std::str::FromStr;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Column a query is sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Name,
    Age,
    Weight,
    Height,
    Country,
    Group,
    Role,
    Category,
    Source,
    RecordUrl,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// SQL expression rows are ordered by
    ///
    /// Weights are stored as text and sort numerically. Heights sort by total
    /// inches read from `feet'inches"`.
    fn sort_key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Weight => "CAST(weight AS INTEGER)",
            Self::Height => {
                "(CAST(substr(height, 1, instr(height, '''') - 1) AS INTEGER) * 12 \
                 + CAST(substr(height, instr(height, '''') + 1) AS INTEGER))"
            }
            Self::Country => "country",
            Self::Group => "group_name",
            Self::Role => "role",
            Self::Category => "category",
            Self::Source => "source_id",
            Self::RecordUrl => "record_url",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "age" => Ok(Self::Age),
            "weight" => Ok(Self::Weight),
            "height" => Ok(Self::Height),
            "country" => Ok(Self::Country),
            "group" | "team" => Ok(Self::Group),
            "role" | "position" => Ok(Self::Role),
            "category" | "sport" => Ok(Self::Category),
            "source" | "source_id" => Ok(Self::Source),
            "record_url" | "url" => Ok(Self::RecordUrl),
            "created_at" | "created" => Ok(Self::CreatedAt),
            "updated_at" | "updated" => Ok(Self::UpdatedAt),
            other => Err(format!("unknown sort field '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Filters, sort and pagination for [`RecordStore::query_records`](super::RecordStore::query_records)
#[derive(Debug, Clone)]
pub struct RecordQuery {
    /// Case-insensitive substring of the name
    pub search: Option<String>,
    pub group: Option<String>,
    pub country: Option<String>,
    pub role: Option<String>,
    pub source_id: Option<String>,
    pub category: Option<String>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub sort_by: SortField,
    pub order: SortOrder,
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            search: None,
            group: None,
            country: None,
            role: None,
            source_id: None,
            category: None,
            min_age: None,
            max_age: None,
            sort_by: SortField::default(),
            order: SortOrder::default(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl RecordQuery {
    /// Page number clamped to >= 1
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Page size clamped to 1..=100
    pub fn per_page(&self) -> u32 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    /// Builds the WHERE clause and its positional parameters
    pub(crate) fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(Value::Text(format!("%{}%", search.trim().to_lowercase())));
            conditions.push(format!("LOWER(name) LIKE ?{}", params.len()));
        }

        let exact = [
            ("group_name", &self.group),
            ("country", &self.country),
            ("role", &self.role),
            ("source_id", &self.source_id),
            ("category", &self.category),
        ];
        for (column, value) in exact {
            if let Some(value) = value {
                params.push(Value::Text(value.clone()));
                conditions.push(format!("{} = ?{}", column, params.len()));
            }
        }

        if let Some(min) = self.min_age {
            params.push(Value::Integer(i64::from(min)));
            conditions.push(format!("age >= ?{}", params.len()));
        }
        if let Some(max) = self.max_age {
            params.push(Value::Integer(i64::from(max)));
            conditions.push(format!("age <= ?{}", params.len()));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, params)
    }

    /// ORDER BY clause; ties break on id so pages are stable
    pub(crate) fn order_clause(&self) -> String {
        format!(
            "ORDER BY {} {}, id ASC",
            self.sort_by.sort_key(),
            self.order.keyword()
        )
    }
}

/// One page of query results
#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    pub records: Vec<StoredRecord>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl RecordPage {
    pub fn new(records: Vec<StoredRecord>, total_count: u64, page: u32, per_page: u32) -> Self {
        let total_pages = total_count.div_ceil(u64::from(per_page)) as u32;
        Self {
            records,
            total_count,
            page,
            per_page,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Distinct values available for each exact-match filter
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterOptions {
    pub categories: Vec<String>,
    pub countries: Vec<String>,
    pub groups: Vec<String>,
    pub roles: Vec<String>,
    pub sources: Vec<String>,
}
