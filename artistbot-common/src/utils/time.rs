// src/utils/time.rs

use chrono::{DateTime, Utc};

/// Formats a length in seconds as `mm:ss`, or `hh:mm:ss` once it reaches an hour.
pub fn format_seconds(total: u64) -> String {
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Display form of a track length: `format_seconds`, or "unknown" for 0.
pub fn duration_label(total: u64) -> String {
    match total {
        0 => "unknown".to_string(),
        secs => format_seconds(secs),
    }
}

/// Whole seconds elapsed since `since`, clamped at zero.
pub fn seconds_since(since: DateTime<Utc>) -> u64 {
    (Utc::now() - since).num_seconds().max(0) as u64
}
