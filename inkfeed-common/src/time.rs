//! Timestamp utilities
//!
//! Records carry local wall-clock timestamps as ISO-8601 strings with
//! microsecond precision (`2025-03-14T09:26:53.589793`). Date filters and the
//! stats page compare against the `YYYY-MM-DD` prefix of that string.

use chrono::{DateTime, Local, NaiveDateTime};

const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Get current local timestamp
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Format a local timestamp the way records store it
pub fn record_timestamp(at: &NaiveDateTime) -> String {
    at.format(RECORD_TIMESTAMP_FORMAT).to_string()
}

/// Current time as a record timestamp string
pub fn now_record_timestamp() -> String {
    record_timestamp(&now().naive_local())
}

/// Today's local date as `YYYY-MM-DD`
pub fn today() -> String {
    now().format("%Y-%m-%d").to_string()
}

/// Caption time shown on composites (`YYYY-MM-DD HH:MM`)
pub fn caption_time(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// First `n` characters of a timestamp string
///
/// Character based, so a hand-edited non-ASCII value never splits a code point.
pub fn truncate_chars(value: &str, n: usize) -> &str {
    match value.char_indices().nth(n) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
