//! Position (role) normalization

use super::title_case;

/// Short codes and spellings mapped to canonical position labels
const POSITIONS: &[(&str, &str)] = &[
    ("g", "Guard"),
    ("guard", "Guard"),
    ("pg", "Point Guard"),
    ("point guard", "Point Guard"),
    ("sg", "Shooting Guard"),
    ("shooting guard", "Shooting Guard"),
    ("f", "Forward"),
    ("forward", "Forward"),
    ("sf", "Small Forward"),
    ("small forward", "Small Forward"),
    ("pf", "Power Forward"),
    ("power forward", "Power Forward"),
    ("c", "Center"),
    ("center", "Center"),
    ("centre", "Center"),
    ("g/f", "Swingman"),
    ("f/g", "Swingman"),
    ("swingman", "Swingman"),
    ("f/c", "Forward-Center"),
    ("c/f", "Forward-Center"),
    ("forward-center", "Forward-Center"),
];

/// Maps a source position to its canonical label
///
/// Unmapped positions are title-cased.
///
/// # Example
///
/// ```
/// use roster_harvest::normalize::normalize_position;
///
/// assert_eq!(normalize_position("G/F").as_deref(), Some("Swingman"));
/// assert_eq!(normalize_position("fly-half").as_deref(), Some("Fly-Half"));
/// ```
pub fn normalize_position(text: &str) -> Option<String> {
    let key = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if key.is_empty() {
        return None;
    }

    let lower = key.to_lowercase();
    let mapped = POSITIONS
        .iter()
        .find(|(code, _)| *code == lower)
        .map(|(_, label)| label.to_string());

    Some(mapped.unwrap_or_else(|| title_case(&key)))
}

/// Returns true if a position looks like an unexpanded abbreviation
pub fn is_abbreviation(text: &str) -> bool {
    text.trim().chars().count() < 3
}
