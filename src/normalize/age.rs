//! Age normalization and derivation from dates of birth

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static AGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\D*?(\d{1,3})(?:\s*(?:years?|yrs?|yo)\b.*)?\s*$").expect("invalid regex"));

/// Date formats seen on source pages, tried in order
const BIRTH_DATE_FORMATS: &[&str] = &[
    "%d %b %Y", // 29 FEB 2000
    "%d %B %Y", // 29 February 2000
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%B %d, %Y", // February 29, 2000
    "%b %d, %Y",
];

/// Oldest age accepted from a source
const MAX_AGE: u32 = 120;

/// Reads an age given directly as an integer (`"25"`, `"Age: 25"`, `"25 years old"`)
pub fn normalize_age(text: &str) -> Option<u32> {
    let caps = AGE_TOKEN.captures(text.trim())?;
    let age: u32 = caps[1].parse().ok()?;
    (age <= MAX_AGE).then_some(age)
}

/// Parses a date of birth in any of the known source formats
pub fn parse_birth_date(text: &str) -> Option<NaiveDate> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    BIRTH_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
}

/// Computes a calendar age on `today` for someone born on `birth`
///
/// One year is subtracted while this year's birthday has not been reached,
/// so a 29 February birthday counts as reached on 1 March in common years.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth > today {
        return None;
    }

    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }

    u32::try_from(years).ok().filter(|age| *age <= MAX_AGE)
}

/// Derives an age on `today` from date-of-birth text
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use roster_harvest::normalize::age_from_birth_date;
///
/// let today = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
/// assert_eq!(age_from_birth_date("29 FEB 2000", today), Some(23));
/// ```
pub fn age_from_birth_date(text: &str, today: NaiveDate) -> Option<u32> {
    age_on(parse_birth_date(text)?, today)
}
