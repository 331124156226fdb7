//! Country normalization

use super::title_case;

/// Nationality adjectives and short forms mapped to country names
const COUNTRIES: &[(&str, &str)] = &[
    ("american", "USA"),
    ("us", "USA"),
    ("usa", "USA"),
    ("united states", "USA"),
    ("british", "UK"),
    ("uk", "UK"),
    ("canadian", "Canada"),
    ("french", "France"),
    ("german", "Germany"),
    ("italian", "Italy"),
    ("spanish", "Spain"),
    ("australian", "Australia"),
    ("cameroonian", "Cameroon"),
    ("brazilian", "Brazil"),
    ("argentine", "Argentina"),
    ("argentinian", "Argentina"),
    ("nigerian", "Nigeria"),
    ("japanese", "Japan"),
    ("chinese", "China"),
    ("filipino", "Philippines"),
    ("korean", "South Korea"),
    ("new zealander", "New Zealand"),
    ("irish", "Ireland"),
    ("scottish", "Scotland"),
    ("welsh", "Wales"),
    ("english", "England"),
    ("south african", "South Africa"),
    ("fijian", "Fiji"),
    ("samoan", "Samoa"),
    ("tongan", "Tonga"),
    ("uae", "UAE"),
];

/// Maps a nationality or country to a canonical country name
///
/// Unmapped input is title-cased.
pub fn normalize_country(text: &str) -> Option<String> {
    let key = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if key.is_empty() {
        return None;
    }

    let lower = key.to_lowercase();
    let mapped = COUNTRIES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, country)| country.to_string());

    Some(mapped.unwrap_or_else(|| title_case(&key)))
}
