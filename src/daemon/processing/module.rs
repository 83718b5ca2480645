use anyhow::Result;
use async_trait::async_trait;

use crate::{
    daemon::storage::record_event::RecordEvent, error::TrackerResult, rollup::RollupOutcome,
};

/// Represents an event processor. This should realistically be able to abstract over different
/// options: local storage, remote server saving.
pub trait EventProcessor {
    fn process_next(&mut self, message: RecordEvent) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}

/// The part of the tracker the ingestion pipeline talks to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, event: RecordEvent) -> TrackerResult<()>;

    /// Observations missing until a rollup is due. Zero means due.
    async fn pending_backlog(&self) -> TrackerResult<u64>;

    async fn rollup(&self) -> TrackerResult<RollupOutcome>;
}
