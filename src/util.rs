// src/util.rs
//! Small time helpers shared by the graph and the store.

use chrono::{DateTime, Utc};

/// Current wall-clock instant as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Rotated-file suffix for a given instant, `year-month-day-hour-minute-second` in UTC.
pub fn rotation_suffix(epoch_ms: i64) -> String {
    let ts = DateTime::<Utc>::from_timestamp_millis(epoch_ms).unwrap_or_else(Utc::now);
    ts.format("%Y-%m-%d-%H-%M-%S").to_string()
}
