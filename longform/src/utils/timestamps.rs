//! Timestamp helpers.

use chrono::{DateTime, Utc};

/// Timestamps carried by events, states and cache entries.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as RFC 3339 with millisecond precision.
#[must_use]
pub fn format_iso(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// `YYYYMMDD` in UTC, used for dated output directories.
#[must_use]
pub fn date_stamp(ts: &Timestamp) -> String {
    ts.format("%Y%m%d").to_string()
}

/// An RFC 3339 timestamp with `:` and `.` replaced so it is safe in file
/// names, e.g. `2024-05-01T12-00-00-123Z`.
#[must_use]
pub fn file_safe_timestamp(ts: &Timestamp) -> String {
    format_iso(ts).replace(&[':', '.'][..], "-")
}
