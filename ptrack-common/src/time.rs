//! Timestamp utilities
//!
//! Timestamps are persisted as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so that lexical ordering in SQLite matches
//! chronological ordering and values round-trip without loss.

use chrono::{DateTime, Datelike, Duration, NaiveTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp
pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// Start of the calendar week containing `at`: the preceding (or same) Sunday, 00:00 UTC
pub fn start_of_week(at: DateTime<Utc>) -> DateTime<Utc> {
    let days_since_sunday = at.weekday().num_days_from_sunday() as i64;
    let sunday = at.date_naive() - Duration::days(days_since_sunday);
    sunday.and_time(NaiveTime::MIN).and_utc()
}

/// Half-open window `[start, end)` of the calendar week containing `at`
pub fn week_window(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_week(at);
    (start, start + Duration::days(7))
}
