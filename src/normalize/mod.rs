//! Normalization of source-specific formats into canonical records
//!
//! Every normalizer is a pure, total function: unparseable input yields
//! `None` rather than an error, and normalizing an already-normalized value
//! returns it unchanged.

mod age;
mod country;
mod height;
mod position;
mod weight;

pub use age::{age_from_birth_date, age_on, normalize_age, parse_birth_date};
pub use country::normalize_country;
pub use height::{cm_to_feet_inches, is_centimetres, normalize_height};
pub use position::{is_abbreviation, normalize_position};
pub use weight::{normalize_weight, parse_weight, ParsedWeight, WeightUnit};

use crate::crawler::RawRecord;
use chrono::NaiveDate;
use serde::Serialize;

/// A normalized player record, keyed by its stable record URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    pub record_url: Option<String>,
    pub name: String,
    pub age: Option<u32>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub category: String,
    pub country: Option<String>,
    pub role: Option<String>,
    pub group: Option<String>,
    pub source_id: String,
}

/// Applies every normalizer to a raw extracted record
///
/// A direct age wins over one derived from the date of birth, which is
/// computed against `today`.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use roster_harvest::crawler::RawRecord;
/// use roster_harvest::normalize::canonicalize;
///
/// let raw = RawRecord {
///     record_url: Some("https://example.com/player/1".into()),
///     name: Some("Jane  Doe".into()),
///     height: Some("200 cm".into()),
///     role: Some("pg".into()),
///     ..Default::default()
/// };
/// let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let record = canonicalize(&raw, "demo", "Basketball", today);
///
/// assert_eq!(record.name, "Jane Doe");
/// assert_eq!(record.height.as_deref(), Some("6'7\""));
/// assert_eq!(record.role.as_deref(), Some("Point Guard"));
/// ```
pub fn canonicalize(raw: &RawRecord, source_id: &str, category: &str, today: NaiveDate) -> CanonicalRecord {
    let age = raw
        .age
        .as_deref()
        .and_then(normalize_age)
        .or_else(|| raw.birth_date.as_deref().and_then(|dob| age_from_birth_date(dob, today)));

    CanonicalRecord {
        record_url: raw.record_url.as_deref().and_then(non_empty),
        name: raw.name.as_deref().map(clean_name).unwrap_or_default(),
        age,
        weight: raw.weight.as_deref().and_then(normalize_weight),
        height: raw.height.as_deref().and_then(normalize_height),
        category: category.trim().to_string(),
        country: raw.country.as_deref().and_then(normalize_country),
        role: raw.role.as_deref().and_then(normalize_position),
        group: raw.group.as_deref().and_then(non_empty),
        source_id: source_id.to_string(),
    }
}

/// Title-cases text: the first letter of every run of letters is upper-cased
/// and the rest lower-cased
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }

    out
}

/// Collapses whitespace and undoes a name the markup rendered twice
/// (`"Jane DoeJane Doe"` becomes `"Jane Doe"`)
pub fn clean_name(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = collapsed.chars().collect();
    let n = chars.len();

    if n >= 2 && n % 2 == 0 && chars[..n / 2] == chars[n / 2..] {
        return chars[..n / 2].iter().collect();
    }
    if n >= 3 && n % 2 == 1 && chars[n / 2] == ' ' && chars[..n / 2] == chars[n / 2 + 1..] {
        return chars[..n / 2].iter().collect();
    }

    collapsed
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
