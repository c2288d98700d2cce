//! Utility functions for trace ids and timestamp handling.

pub mod timestamps;

pub use timestamps::{
    date_stamp, file_safe_timestamp, format_iso, now_utc, Timestamp,
};

use uuid::Uuid;

/// Generates a new trace id (UUID v4, hyphenated).
#[must_use]
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}
