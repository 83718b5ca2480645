use std::fmt::Display;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, TimeZone, Utc};
use clap::ValueEnum;

use crate::rollup::trigger::DEFAULT_THRESHOLD;

/// Time zone used to decide which wall-clock hour an observation belongs to.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum BucketZone {
    /// Machine local time. Matches what the user sees on their clock.
    #[default]
    Local,
    Utc,
}

impl BucketZone {
    /// Wall-clock representation of `moment` in this zone. [None] when shifting by the local
    /// offset leaves the representable range.
    pub fn wall_clock(&self, moment: DateTime<Utc>) -> Option<NaiveDateTime> {
        match self {
            BucketZone::Local => {
                let offset = Local.offset_from_utc_datetime(&moment.naive_utc());
                shift_by_offset(moment.naive_utc(), offset)
            }
            BucketZone::Utc => Some(moment.naive_utc()),
        }
    }
}

fn shift_by_offset(utc: NaiveDateTime, offset: FixedOffset) -> Option<NaiveDateTime> {
    utc.checked_add_signed(TimeDelta::seconds(offset.local_minus_utc().into()))
}

impl Display for BucketZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketZone::Local => write!(f, "local"),
            BucketZone::Utc => write!(f, "utc"),
        }
    }
}

/// Effective settings of a tracker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Number of pending observations at which a rollup becomes due.
    pub threshold: u64,
    pub zone: BucketZone,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            zone: BucketZone::default(),
        }
    }
}

impl TrackerConfig {
    pub fn with_threshold(self, threshold: u64) -> Self {
        Self { threshold, ..self }
    }

    pub fn with_zone(self, zone: BucketZone) -> Self {
        Self { zone, ..self }
    }
}
