//! Weight normalization
//!
//! Canonical weights are a bare integer string. The unit is not persisted;
//! sources are assumed to report kilograms unless they mark pounds.

use regex::Regex;
use std::sync::LazyLock;

static WITH_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)(?:[.,]\d+)?\s*(kgs?|kilograms?|lbs?|pounds?)\b").expect("invalid regex")
});

static BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("invalid regex"));

/// Unit a source weight was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUnit {
    Kilograms,
    Pounds,
}

/// A weight read from source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedWeight {
    pub value: String,
    pub unit: WeightUnit,
}

/// Reads the first integer token followed by a unit marker
///
/// A bare integer is taken as kilograms.
pub fn parse_weight(text: &str) -> Option<ParsedWeight> {
    let text = text.trim();

    if BARE.is_match(text) {
        return Some(ParsedWeight {
            value: strip_leading_zeros(text),
            unit: WeightUnit::Kilograms,
        });
    }

    let caps = WITH_UNIT.captures(text)?;
    let unit = if caps[2].to_ascii_lowercase().starts_with('k') {
        WeightUnit::Kilograms
    } else {
        WeightUnit::Pounds
    };

    Some(ParsedWeight {
        value: strip_leading_zeros(&caps[1]),
        unit,
    })
}

/// Normalizes source weight text to a bare numeric string
///
/// # Example
///
/// ```
/// use roster_harvest::normalize::normalize_weight;
///
/// assert_eq!(normalize_weight("Weight: 95 kg").as_deref(), Some("95"));
/// assert_eq!(normalize_weight("95").as_deref(), Some("95"));
/// ```
pub fn normalize_weight(text: &str) -> Option<String> {
    parse_weight(text)
        .map(|w| w.value)
        .filter(|value| value != "0")
}

fn strip_leading_zeros(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
