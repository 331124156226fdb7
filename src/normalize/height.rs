//! Height normalization
//!
//! Canonical heights are written `feet'inches"`, e.g. `6'7"`.

use regex::Regex;
use std::sync::LazyLock;

/// Feet per centimetre
const FEET_PER_CM: f64 = 0.0328084;

/// Larger centimetre values are not a person's height
const MAX_CENTIMETRES: f64 = 300.0;

static CENTIMETRES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:[.,]\d+)?)\s*(?:cm)?$").expect("invalid regex"));

// 6'7", 6'7'', 6’7” and 6' 7 all match.
static FEET_INCHES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\d+)\s*['’′]\s*(?:(\d+(?:\.\d+)?)\s*(?:"|''|”|″|’’)?)?$"#).expect("invalid regex")
});

/// Normalizes a source height to `feet'inches"`
///
/// Centimetre values (`"200"`, `"200cm"`, `"200 cm"`) are converted; values
/// already in feet and inches pass through with the inch mark rewritten to a
/// single `"`. Returns `None` for anything else.
///
/// # Example
///
/// ```
/// use roster_harvest::normalize::normalize_height;
///
/// assert_eq!(normalize_height("200 cm").as_deref(), Some("6'7\""));
/// assert_eq!(normalize_height("6'7''").as_deref(), Some("6'7\""));
/// ```
pub fn normalize_height(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = FEET_INCHES.captures(text) {
        let feet: u32 = caps[1].parse().ok()?;
        let inches = match caps.get(2) {
            Some(m) => m.as_str().parse::<f64>().ok()?.round() as u32,
            None => 0,
        };
        if inches >= 12 {
            return None;
        }
        return Some(format_feet_inches(feet, inches));
    }

    let caps = CENTIMETRES.captures(text)?;
    let cm: f64 = caps[1].replace(',', ".").parse().ok()?;
    cm_to_feet_inches(cm)
}

/// Converts centimetres to `feet'inches"`
///
/// Feet are the integer part of `cm × 0.0328084`; inches are the rounded
/// remainder × 12, carried into the next foot when they round up to 12.
/// Values above 300 cm yield `None`.
pub fn cm_to_feet_inches(cm: f64) -> Option<String> {
    if !cm.is_finite() || cm <= 0.0 || cm > MAX_CENTIMETRES {
        return None;
    }

    let total_feet = cm * FEET_PER_CM;
    let mut feet = total_feet.trunc() as u32;
    let mut inches = ((total_feet - total_feet.trunc()) * 12.0).round() as u32;
    if inches == 12 {
        feet = feet.checked_add(1)?;
        inches = 0;
    }

    Some(format_feet_inches(feet, inches))
}

/// Returns true if the text still carries a centimetre height
pub fn is_centimetres(text: &str) -> bool {
    text.to_ascii_lowercase().contains("cm")
}

fn format_feet_inches(feet: u32, inches: u32) -> String {
    format!("{}'{}\"", feet, inches)
}
