use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::{TrackerError, TrackerResult},
    utils::time::is_valid_timestamp,
};

/// A single sampled second as produced by the activity sampler.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct RecordEvent {
    pub app_name: Arc<str>,
    /// Full path to an executable. For example /usr/bin/nvim
    #[serde(default = "empty_path")]
    pub app_path: Arc<str>,
    /// Unix epoch seconds.
    pub timestamp: i64,
}

fn empty_path() -> Arc<str> {
    "".into()
}

impl RecordEvent {
    pub fn new(app_name: impl Into<Arc<str>>, app_path: impl Into<Arc<str>>, timestamp: i64) -> Self {
        Self {
            app_name: app_name.into(),
            app_path: app_path.into(),
            timestamp,
        }
    }

    /// Rejects events that must never reach storage.
    pub fn validate(&self) -> TrackerResult<()> {
        if self.app_name.trim().is_empty() {
            return Err(TrackerError::Validation("application name is empty".into()));
        }
        if !is_valid_timestamp(self.timestamp) {
            return Err(TrackerError::Validation(format!(
                "timestamp {} is not a valid epoch second",
                self.timestamp
            )));
        }
        Ok(())
    }

    /// Parses one line of newline-delimited JSON.
    pub fn parse_line(line: &str) -> TrackerResult<Self> {
        let event = serde_json::from_str::<RecordEvent>(line)
            .map_err(|e| TrackerError::Validation(format!("malformed observation: {e}")))?;
        event.validate()?;
        Ok(event)
    }
}
