use anyhow::Result;
use tracing::{error, info, trace};

use crate::daemon::storage::record_event::RecordEvent;

use super::module::{EventProcessor, UsageRecorder};

/// Bridges [ProcessingModule](super::ProcessingModule) and the tracker. Every stored observation
/// is followed by a backlog check, and a due rollup runs before the next observation is taken.
pub struct ObservationSaver<R: UsageRecorder> {
    recorder: R,
}

impl<R: UsageRecorder> ObservationSaver<R> {
    pub fn new(recorder: R) -> Self {
        Self { recorder }
    }

    async fn rollup_if_due(&mut self) -> Result<()> {
        let remaining = self.recorder.pending_backlog().await?;
        if remaining > 0 {
            trace!("Rollup due in {remaining} observations");
            return Ok(());
        }

        // A failed rollup leaves the backlog in place, so the next observation tries again.
        match self.recorder.rollup().await {
            Ok(outcome) => info!("Rollup finished {:?}", outcome),
            Err(e) if e.is_retryable() => {
                error!("Rollup failed, observations kept for the next attempt: {e}")
            }
            Err(e) => error!("Rollup aborted, stored data needs attention: {e}"),
        }
        Ok(())
    }
}

impl<R: UsageRecorder> EventProcessor for ObservationSaver<R> {
    async fn process_next(&mut self, message: RecordEvent) -> Result<()> {
        self.recorder.record(message).await?;
        self.rollup_if_due().await
    }

    async fn finalize(&mut self) -> Result<()> {
        let remaining = self.recorder.pending_backlog().await?;
        info!("Ingestion stopped, {remaining} observations until next rollup");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use mockall::{predicate::eq, Sequence};

    use crate::{
        daemon::{
            processing::module::{EventProcessor, MockUsageRecorder},
            storage::record_event::RecordEvent,
        },
        error::TrackerError,
        rollup::RollupOutcome,
    };

    use super::ObservationSaver;

    fn event(timestamp: i64) -> RecordEvent {
        RecordEvent::new("Editor", "/bin/editor", timestamp)
    }

    #[tokio::test]
    async fn test_rollup_runs_only_when_due() -> Result<()> {
        let mut recorder = MockUsageRecorder::new();
        let mut sequence = Sequence::new();
        recorder
            .expect_record()
            .with(eq(event(1)))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));
        recorder
            .expect_pending_backlog()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(1));
        recorder
            .expect_record()
            .with(eq(event(2)))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));
        recorder
            .expect_pending_backlog()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(0));
        recorder
            .expect_rollup()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| {
                Ok(RollupOutcome {
                    observations: 2,
                    buckets: 1,
                    reclaimed: true,
                })
            });

        let mut saver = ObservationSaver::new(recorder);
        saver.process_next(event(1)).await?;
        saver.process_next(event(2)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_rollup_does_not_fail_ingestion() -> Result<()> {
        let mut recorder = MockUsageRecorder::new();
        recorder.expect_record().returning(|_| Ok(()));
        recorder.expect_pending_backlog().returning(|| Ok(0));
        recorder
            .expect_rollup()
            .times(2)
            .returning(|| Err(TrackerError::Worker("storage is gone".into())));

        let mut saver = ObservationSaver::new(recorder);
        saver.process_next(event(1)).await?;
        saver.process_next(event(2)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_observation_skips_trigger() -> Result<()> {
        let mut recorder = MockUsageRecorder::new();
        recorder
            .expect_record()
            .returning(|_| Err(TrackerError::Validation("application name is empty".into())));
        recorder.expect_pending_backlog().never();
        recorder.expect_rollup().never();

        let mut saver = ObservationSaver::new(recorder);
        assert!(saver.process_next(event(1)).await.is_err());
        Ok(())
    }
}
