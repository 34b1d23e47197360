//! Timestamp formatting shared by the storage layer and every engine.
//!
//! Timestamps are stored as TEXT in SQLite, ISO-8601, UTC, millisecond
//! precision (`2024-01-15T09:30:00.123Z`). `format_datetime`/`parse_datetime`
//! are the single choke point for that representation so the on-disk format
//! can never drift between callers.

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp as ISO-8601 UTC with millisecond precision.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a stored timestamp string, falling back through the formats this
/// engine (and any historical data it might have imported) has written.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Fallback: naive "YYYY-MM-DD HH:MM:SS" with no offset, assume UTC.
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}

/// Returns the current instant, formatted for storage.
pub fn now_str() -> String {
    format_datetime(&Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_formatting() {
        let now = Utc::now();
        let s = format_datetime(&now);
        let parsed = parse_datetime(&s).unwrap();
        // Millisecond precision: compare truncated.
        assert_eq!(format_datetime(&parsed), s);
    }

    #[test]
    fn parses_naive_fallback() {
        let parsed = parse_datetime("2024-01-15 09:30:00.500").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-01-15");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_datetime("not a date").is_none());
    }
}
