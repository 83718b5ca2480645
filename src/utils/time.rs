use chrono::{DateTime, NaiveDateTime, Timelike};

use crate::config::BucketZone;

/// First rejected epoch second, 9999-12-31T00:00:00Z. Every accepted timestamp stays inside year
/// 9999 under any UTC offset, so it always has an hour bucket.
pub const TIMESTAMP_LIMIT: i64 = 253_402_214_400;

/// Start of the hour `timestamp` falls into. Returns [None] when the timestamp can't be
/// represented as a date in `zone`.
pub fn hour_bucket(timestamp: i64, zone: BucketZone) -> Option<NaiveDateTime> {
    let moment = DateTime::from_timestamp(timestamp, 0)?;
    let wall = zone.wall_clock(moment)?;
    wall.date().and_hms_opt(wall.hour(), 0, 0)
}

/// Whether `timestamp` is a usable epoch second.
pub fn is_valid_timestamp(timestamp: i64) -> bool {
    (0..TIMESTAMP_LIMIT).contains(&timestamp)
}

/// This is the standard way of printing durations in screentime. Zero units are skipped,
/// except for a zero duration itself.
pub fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}
