use tracing::trace;

use crate::{daemon::storage::database::Database, error::TrackerResult};

/// Ten minutes of observations at one sample per second.
pub const DEFAULT_THRESHOLD: u64 = 600;

/// Observations still missing before a rollup becomes due. Zero means due.
pub fn backlog_remaining(threshold: u64, pending: u64) -> u64 {
    threshold.saturating_sub(pending)
}

/// Decides when enough raw observations piled up to justify a rollup. The trigger is polled by
/// the caller, it never schedules anything on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklogTrigger {
    threshold: u64,
}

impl BacklogTrigger {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub async fn backlog_remaining(&self, db: &Database) -> TrackerResult<u64> {
        let pending = db.pending_count().await?;
        let remaining = backlog_remaining(self.threshold, pending);
        trace!("Backlog has {pending} pending observations, {remaining} until rollup");
        Ok(remaining)
    }
}
