//! Date/time helpers
//!
//! All dates are instants in UTC. Numbers are interpreted as milliseconds since the Unix
//! epoch, and text is parsed from the common ISO-8601 shapes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Date-time layouts accepted in addition to RFC 3339
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Date-only layouts (interpreted as midnight UTC)
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a date or date-time string.
///
/// Returns `None` for anything that is not a recognizable date.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

/// Build a date from milliseconds since the Unix epoch
pub fn from_timestamp_ms(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(ms.trunc() as i64).single()
}

/// Milliseconds since the Unix epoch
pub fn timestamp_ms(date: &DateTime<Utc>) -> f64 {
    date.timestamp_millis() as f64
}

/// ISO-8601 rendering with millisecond precision, e.g. `2024-01-15T00:00:00.000Z`
pub fn to_iso_string(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}
