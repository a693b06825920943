//! Lenient field parsers shared by the sources and providers.

use chrono::NaiveDate;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parse a calendar date in any format the sources emit.
///
/// A trailing time-of-day (`2024-01-02 00:00:00`) is ignored. Blank input is
/// `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.split(|c: char| c == ' ' || c == 'T').next().unwrap_or(raw);
    if date_part.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Parse a finite decimal number. Blank, non-numeric, NaN and infinite
/// inputs are all `None`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
