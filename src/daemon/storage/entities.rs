use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type AppId = i64;

/// Name used for the executable location when nothing better is known.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// An application that has been seen at least once. Rows are never deleted.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ApplicationEntity {
    pub id: AppId,
    pub name: String,
    pub file_location: String,
    pub icon_location: Option<String>,
}

/// One second of foreground activity waiting to be rolled up.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct RawObservationEntity {
    pub id: i64,
    pub timestamp: i64,
    pub app_id: AppId,
}

/// Aggregation key of [HourlyAggregateEntity]. `hour` is always the start of a wall-clock hour.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct BucketKey {
    pub hour: NaiveDateTime,
    pub app_id: AppId,
}

/// Seconds an application spent in the foreground during one hour. This is the permanent
/// history; `duration` only ever grows.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct HourlyAggregateEntity {
    pub hour: NaiveDateTime,
    pub app_id: AppId,
    pub duration: i64,
}
