//! Timestamp helpers.
//!
//! Timestamps are truncated to microseconds and persisted as fixed-width
//! RFC 3339 UTC strings, so text ordering in SQLite matches time ordering and
//! a value read back from storage compares equal to the one written.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time, truncated to microsecond precision.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a timestamp written by [`format_timestamp`].
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}
