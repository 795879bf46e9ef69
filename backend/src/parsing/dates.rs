//! Date parsing strategies used by date-column detection.
//!
//! Strategies are tried in a fixed order: every explicit format on its own,
//! then a permissive generic parser, then per-cell format inference. A cell
//! that is already a [`Cell::Date`] parses under every strategy; a number
//! parses only when it looks like Unix epoch seconds.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::Cell;

/// Inclusive bounds for numbers read as Unix epoch seconds.
pub const EPOCH_SECONDS_MIN: f64 = 1e9;
pub const EPOCH_SECONDS_MAX: f64 = 1e10;

/// Strict formats, in the order they are tried.
pub const EXPLICIT_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d-%m-%Y",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y%m%d",
    "%m/%d/%y",
    "%d/%m/%y",
    "%m/%d/%y %H:%M",
    "%d/%m/%y %H:%M",
];

const GENERIC_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%d %b %Y %H:%M",
    "%b %d, %Y %H:%M",
];

const GENERIC_DATE_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%A, %B %d, %Y",
    "%a, %d %b %Y",
    "%Y-%b-%d",
];

/// One way of reading a column's cells as dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStrategy {
    /// A single strict `chrono` format string.
    Format(&'static str),
    /// RFC 3339 / RFC 2822 / month-name formats.
    Generic,
    /// Each cell independently tries every explicit format, then generic.
    Inferred,
}

impl DateStrategy {
    /// All strategies in acceptance order.
    pub fn ordered() -> Vec<DateStrategy> {
        EXPLICIT_FORMATS
            .iter()
            .copied()
            .map(DateStrategy::Format)
            .chain([DateStrategy::Generic, DateStrategy::Inferred])
            .collect()
    }

    pub fn parse(&self, cell: &Cell) -> Option<NaiveDateTime> {
        match cell {
            Cell::Date(dt) => Some(*dt),
            Cell::Number(n) => epoch_seconds(*n),
            Cell::Text(raw) => {
                let text = raw.trim();
                match self {
                    DateStrategy::Format(format) => parse_with_format(text, format),
                    DateStrategy::Generic => parse_generic(text),
                    DateStrategy::Inferred => parse_inferred(text),
                }
            }
            Cell::Null | Cell::Bool(_) => None,
        }
    }
}

impl fmt::Display for DateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateStrategy::Format(format) => write!(f, "format {}", format),
            DateStrategy::Generic => f.write_str("generic"),
            DateStrategy::Inferred => f.write_str("inferred"),
        }
    }
}

/// Read a number as Unix epoch seconds when it falls in the plausible range.
pub fn epoch_seconds(value: f64) -> Option<NaiveDateTime> {
    if !(EPOCH_SECONDS_MIN..=EPOCH_SECONDS_MAX).contains(&value) {
        return None;
    }
    let secs = value.trunc() as i64;
    let nanos = ((value - value.trunc()) * 1e9).round() as u32;
    DateTime::from_timestamp(secs, nanos.min(999_999_999)).map(|dt| dt.naive_utc())
}

/// Parse with one strict format. Formats using `%Y` require a four-digit year,
/// so `1/15/24` is left for the two-digit-year formats.
pub fn parse_with_format(text: &str, format: &str) -> Option<NaiveDateTime> {
    let parsed = if format.contains("%H") {
        NaiveDateTime::parse_from_str(text, format).ok()
    } else {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN))
    }?;

    if format.contains("%Y") && parsed.year() < 1000 {
        return None;
    }
    Some(parsed)
}

/// Permissive parse: RFC 3339, RFC 2822, then month-name and fractional-second
/// layouts.
pub fn parse_generic(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_local());
    }
    GENERIC_DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            GENERIC_DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Per-cell inference: first explicit format that fits, else generic.
pub fn parse_inferred(text: &str) -> Option<NaiveDateTime> {
    EXPLICIT_FORMATS
        .iter()
        .find_map(|f| parse_with_format(text, f))
        .or_else(|| parse_generic(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_iso_format_parses_date_only() {
        let s = DateStrategy::Format("%Y-%m-%d");
        assert_eq!(s.parse(&text("2024-01-15")), Some(ymd(2024, 1, 15)));
        assert_eq!(s.parse(&text(" 2024-01-15 ")), Some(ymd(2024, 1, 15)));
        assert_eq!(s.parse(&text("15/01/2024")), None);
    }

    #[test]
    fn test_format_with_time_keeps_time() {
        let s = DateStrategy::Format("%Y-%m-%d %H:%M:%S");
        let parsed = s.parse(&text("2024-01-15 13:45:00")).unwrap();
        assert_eq!(parsed.date(), ymd(2024, 1, 15).date());
        assert_eq!(parsed.time(), NaiveTime::from_hms_opt(13, 45, 0).unwrap());
    }

    #[test]
    fn test_four_digit_year_required_for_percent_y() {
        assert_eq!(parse_with_format("1/15/24", "%m/%d/%Y"), None);
        assert_eq!(parse_with_format("1/15/24", "%m/%d/%y"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_compact_format() {
        assert_eq!(parse_with_format("20240115", "%Y%m%d"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_generic_handles_rfc_and_month_names() {
        assert_eq!(
            parse_generic("2024-01-15T10:00:00+02:00").map(|d| d.date()),
            Some(ymd(2024, 1, 15).date())
        );
        assert_eq!(
            parse_generic("Mon, 15 Jan 2024 10:00:00 +0000").map(|d| d.date()),
            Some(ymd(2024, 1, 15).date())
        );
        assert_eq!(parse_generic("15 Jan 2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_generic("Jan 15, 2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_generic("not a date"), None);
    }

    #[test]
    fn test_inferred_mixes_formats_per_cell() {
        let s = DateStrategy::Inferred;
        assert_eq!(s.parse(&text("2024-01-15")), Some(ymd(2024, 1, 15)));
        assert_eq!(s.parse(&text("16.01.2024")), Some(ymd(2024, 1, 16)));
        assert_eq!(s.parse(&text("17 Jan 2024")), Some(ymd(2024, 1, 17)));
    }

    #[test]
    fn test_epoch_numbers_only_in_range() {
        let s = DateStrategy::Format("%Y-%m-%d");
        assert_eq!(
            s.parse(&Cell::Number(1_705_276_800.0)),
            Some(ymd(2024, 1, 15))
        );
        assert_eq!(s.parse(&Cell::Number(42.0)), None);
        assert_eq!(s.parse(&Cell::Number(2e10)), None);
    }

    #[test]
    fn test_date_cells_and_nulls() {
        let d = ymd(2024, 3, 1);
        for strategy in DateStrategy::ordered() {
            assert_eq!(strategy.parse(&Cell::Date(d)), Some(d));
            assert_eq!(strategy.parse(&Cell::Null), None);
            assert_eq!(strategy.parse(&Cell::Bool(true)), None);
        }
    }

    #[test]
    fn test_ordered_ends_with_generic_then_inferred() {
        let all = DateStrategy::ordered();
        assert_eq!(all.len(), EXPLICIT_FORMATS.len() + 2);
        assert_eq!(all[0], DateStrategy::Format("%Y-%m-%d"));
        assert_eq!(all[all.len() - 2], DateStrategy::Generic);
        assert_eq!(all[all.len() - 1], DateStrategy::Inferred);
    }
}
