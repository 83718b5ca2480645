//! Folds raw per-second observations into hourly aggregates.
//!
//! A rollup merges every pending observation and truncates the raw log in one SQLite transaction,
//! then vacuums the file. Readers going through [Database] are queued on the same storage thread,
//! so they see the data either before or after a merge, never half of it.

pub mod trigger;

use std::{collections::BTreeMap, sync::Arc};

use rusqlite::{params, types::Value, Connection, TransactionBehavior};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::BucketZone,
    daemon::storage::{
        database::Database,
        entities::{BucketKey, RawObservationEntity},
        raw_events::RawEventRepository,
    },
    error::{TrackerError, TrackerResult},
    utils::time::hour_bucket,
};

/// What a single [RollupEngine::run] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RollupOutcome {
    /// Observations folded into aggregates and removed from the raw log.
    pub observations: u64,
    /// Hourly buckets touched.
    pub buckets: usize,
    /// Whether the space freed by the truncation was given back.
    pub reclaimed: bool,
}

impl RollupOutcome {
    pub fn is_noop(&self) -> bool {
        self.observations == 0
    }
}

/// Runs rollups against a [Database]. Clones share the same lock, so at most one rollup is in
/// flight per engine family.
#[derive(Clone)]
pub struct RollupEngine {
    db: Database,
    zone: BucketZone,
    running: Arc<Mutex<()>>,
}

impl RollupEngine {
    pub fn new(db: Database, zone: BucketZone) -> Self {
        Self {
            db,
            zone,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Merges all pending observations into hourly aggregates and drains the raw log. Calling it
    /// with nothing pending is a no-op. On failure nothing is truncated and the same
    /// observations are picked up by the next run.
    #[instrument(skip(self))]
    pub async fn run(&self) -> TrackerResult<RollupOutcome> {
        let _running = self.running.lock().await;

        let zone = self.zone;
        let mut outcome = self
            .db
            .execute(move |conn| merge_pending(conn, zone))
            .await?;

        if outcome.is_noop() {
            debug!("Nothing to roll up");
            return Ok(outcome);
        }

        outcome.reclaimed = match self.db.execute(reclaim_space).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to reclaim space after rollup {e}");
                false
            }
        };

        info!(
            "Rolled up {} observations into {} hourly buckets",
            outcome.observations, outcome.buckets
        );
        Ok(outcome)
    }
}

/// Groups observations by hour and application. Each observation is worth one second.
pub fn bucket_observations(
    observations: &[RawObservationEntity],
    zone: BucketZone,
) -> TrackerResult<BTreeMap<BucketKey, i64>> {
    let mut buckets = BTreeMap::<BucketKey, i64>::new();
    for observation in observations {
        let hour = hour_bucket(observation.timestamp, zone).ok_or_else(|| {
            TrackerError::Consistency(format!(
                "stored observation {} has unusable timestamp {}",
                observation.id, observation.timestamp
            ))
        })?;
        let seconds = buckets
            .entry(BucketKey {
                hour,
                app_id: observation.app_id,
            })
            .or_insert(0);
        *seconds = seconds.checked_add(1).ok_or_else(|| {
            TrackerError::Consistency(format!("bucket {hour} overflowed while counting"))
        })?;
    }
    Ok(buckets)
}

fn merge_pending(conn: &mut Connection, zone: BucketZone) -> TrackerResult<RollupOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let observations = RawEventRepository::new(&tx).snapshot()?;
    let Some(last_id) = observations.iter().map(|v| v.id).max() else {
        return Ok(RollupOutcome::default());
    };

    let buckets = bucket_observations(&observations, zone)?;
    for (key, delta) in &buckets {
        merge_bucket(&tx, key, *delta)?;
    }

    let truncated = RawEventRepository::new(&tx).truncate_through(last_id)?;
    if truncated != observations.len() {
        return Err(TrackerError::Consistency(format!(
            "expected to truncate {} observations, removed {truncated}",
            observations.len()
        )));
    }

    tx.commit()?;

    Ok(RollupOutcome {
        observations: observations.len() as u64,
        buckets: buckets.len(),
        reclaimed: false,
    })
}

/// Adds `delta` seconds to the bucket in one statement and returns the new duration.
fn merge_bucket(conn: &Connection, key: &BucketKey, delta: i64) -> TrackerResult<i64> {
    if delta <= 0 {
        return Err(TrackerError::Consistency(format!(
            "refusing to merge delta {delta} into {} for app {}",
            key.hour, key.app_id
        )));
    }

    let merged: Value = conn.query_row(
        "INSERT INTO hourly_records (hour, app_id, duration) VALUES (?1, ?2, ?3)
         ON CONFLICT(hour, app_id) DO UPDATE SET duration = duration + excluded.duration
         RETURNING duration",
        params![key.hour, key.app_id, delta],
        |row| row.get(0),
    )?;

    // SQLite turns overflowing integer arithmetic into REAL.
    match merged {
        Value::Integer(duration) if duration >= 0 => Ok(duration),
        other => Err(TrackerError::Consistency(format!(
            "merging {delta}s into {} for app {} produced {other:?}",
            key.hour, key.app_id
        ))),
    }
}

fn reclaim_space(conn: &mut Connection) -> TrackerResult<()> {
    conn.execute_batch("VACUUM")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
    use rusqlite::params;
    use tempfile::tempdir;

    use crate::{
        config::BucketZone,
        daemon::storage::{
            database::Database,
            entities::{HourlyAggregateEntity, RawObservationEntity},
            record_event::RecordEvent,
        },
        error::TrackerError,
        utils::logging::TEST_LOGGING,
    };

    use super::{bucket_observations, RollupEngine};

    fn at(h: u32, m: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, s)
            .unwrap()
            .timestamp()
    }

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    async fn open(dir: &tempfile::TempDir) -> Result<(Database, RollupEngine)> {
        let db = Database::open(dir.path().join("screentime.db"))?;
        let engine = RollupEngine::new(db.clone(), BucketZone::Utc);
        Ok((db, engine))
    }

    async fn record(db: &Database, name: &str, timestamp: i64) -> Result<()> {
        db.record_observation(RecordEvent::new(name, format!("/bin/{name}"), timestamp))
            .await?;
        Ok(())
    }

    async fn total_duration(db: &Database) -> Result<i64> {
        Ok(db
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT COALESCE(SUM(duration), 0) FROM hourly_records",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await?)
    }

    #[test]
    fn test_bucketing_folds_same_hour() -> Result<()> {
        let observations = [
            RawObservationEntity { id: 1, timestamp: at(9, 15, 3), app_id: 1 },
            RawObservationEntity { id: 2, timestamp: at(9, 47, 22), app_id: 1 },
            RawObservationEntity { id: 3, timestamp: at(9, 59, 59), app_id: 2 },
            RawObservationEntity { id: 4, timestamp: at(10, 0, 0), app_id: 1 },
        ];

        let buckets = bucket_observations(&observations, BucketZone::Utc)?;

        let flattened = buckets
            .into_iter()
            .map(|(key, seconds)| (key.hour, key.app_id, seconds))
            .collect::<Vec<_>>();
        assert_eq!(
            flattened,
            vec![(hour(9), 1, 2), (hour(9), 2, 1), (hour(10), 1, 1)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_rollup_produces_single_bucket() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let (db, engine) = open(&dir).await?;

        record(&db, "Editor", at(9, 15, 3)).await?;
        record(&db, "Editor", at(9, 47, 22)).await?;

        let outcome = engine.run().await?;
        assert_eq!(outcome.observations, 2);
        assert_eq!(outcome.buckets, 1);
        assert!(outcome.reclaimed);

        let aggregates = db.hourly_aggregates().await?;
        let editor = db.application("Editor").await?.unwrap();
        assert_eq!(
            aggregates,
            vec![HourlyAggregateEntity {
                hour: hour(9),
                app_id: editor.id,
                duration: 2
            }]
        );
        assert_eq!(db.pending_count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_rollup_conserves_seconds_across_runs() -> Result<()> {
        let dir = tempdir()?;
        let (db, engine) = open(&dir).await?;

        let mut ingested = 0;
        for batch in 0..3u32 {
            for second in 0..50u32 {
                record(&db, "Editor", at(9 + batch, second, 0)).await?;
                record(&db, "Browser", at(9, second, batch)).await?;
                ingested += 2;
            }
            engine.run().await?;
        }

        assert_eq!(total_duration(&db).await?, ingested);
        assert_eq!(db.pending_count().await?, 0);

        let browser = db.application("Browser").await?.unwrap();
        let browser_nine = db
            .hourly_aggregates()
            .await?
            .into_iter()
            .find(|v| v.app_id == browser.id && v.hour == hour(9))
            .unwrap();
        assert_eq!(browser_nine.duration, 150);
        Ok(())
    }

    #[tokio::test]
    async fn test_rollup_is_idempotent_without_new_data() -> Result<()> {
        let dir = tempdir()?;
        let (db, engine) = open(&dir).await?;

        assert!(engine.run().await?.is_noop());

        record(&db, "Editor", at(9, 0, 0)).await?;
        engine.run().await?;
        let before = db.hourly_aggregates().await?;

        let second = engine.run().await?;
        assert!(second.is_noop());
        assert!(!second.reclaimed);
        assert_eq!(db.hourly_aggregates().await?, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_merge_keeps_raw_observations() -> Result<()> {
        *TEST_LOGGING;
        let failing_dir = tempdir()?;
        let (db, engine) = open(&failing_dir).await?;
        let reference_dir = tempdir()?;
        let (reference_db, reference_engine) = open(&reference_dir).await?;

        for second in 0..10 {
            for target in [&db, &reference_db] {
                record(target, "Editor", at(9, 0, second)).await?;
                record(target, "Browser", at(9, 30, second)).await?;
                record(target, "Browser", at(11, 30, second)).await?;
            }
        }

        // Editor gets merged first, so the abort has to undo a merge already applied.
        db.execute(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER fail_browser_merge BEFORE INSERT ON hourly_records
                 WHEN NEW.app_id = (SELECT id FROM apps WHERE app_name = 'Browser')
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )?;
            Ok(())
        })
        .await?;

        let failed = engine.run().await;
        assert!(matches!(failed, Err(TrackerError::Storage(_))));
        assert!(failed.unwrap_err().is_retryable());
        assert_eq!(db.pending_count().await?, 30);
        assert!(db.hourly_aggregates().await?.is_empty());

        db.execute(|conn| {
            conn.execute_batch("DROP TRIGGER fail_browser_merge")?;
            Ok(())
        })
        .await?;

        let retried = engine.run().await?;
        reference_engine.run().await?;

        assert_eq!(retried.observations, 30);
        assert_eq!(
            db.denormalized_export().await?,
            reference_db.denormalized_export().await?
        );
        assert_eq!(total_duration(&db).await?, 30);
        Ok(())
    }

    #[tokio::test]
    async fn test_overflowing_merge_is_a_consistency_error() -> Result<()> {
        let dir = tempdir()?;
        let (db, engine) = open(&dir).await?;

        let app_id = db.resolve_application("Editor", "/bin/Editor").await?;
        db.execute(move |conn| {
            conn.execute(
                "INSERT INTO hourly_records (hour, app_id, duration) VALUES (?1, ?2, ?3)",
                params![hour(9), app_id, i64::MAX],
            )?;
            Ok(())
        })
        .await?;
        record(&db, "Editor", at(9, 10, 0)).await?;

        let result = engine.run().await;
        assert!(matches!(result, Err(TrackerError::Consistency(_))));
        assert_eq!(db.pending_count().await?, 1);
        assert_eq!(db.hourly_aggregates().await?[0].duration, i64::MAX);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_serialized() -> Result<()> {
        let dir = tempdir()?;
        let (db, engine) = open(&dir).await?;
        for second in 0..120 {
            record(&db, "Editor", at(9, second / 60, second % 60)).await?;
        }

        let other = engine.clone();
        let (first, second) = tokio::join!(engine.run(), other.run());
        let folded = first?.observations + second?.observations;

        assert_eq!(folded, 120);
        assert_eq!(total_duration(&db).await?, 120);
        Ok(())
    }

    #[tokio::test]
    async fn test_rollup_reclaims_space() -> Result<()> {
        let dir = tempdir()?;
        let (db, engine) = open(&dir).await?;
        for second in 0..600 {
            record(&db, "Editor", at(9, second / 60, second % 60)).await?;
        }

        let outcome = engine.run().await?;
        assert!(outcome.reclaimed);

        let free_pages: i64 = db
            .execute(|conn| Ok(conn.pragma_query_value(None, "freelist_count", |row| row.get(0))?))
            .await?;
        assert_eq!(free_pages, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_readers_never_see_partial_rollup() -> Result<()> {
        let dir = tempdir()?;
        let (db, engine) = open(&dir).await?;
        for second in 0..600 {
            let app = if second % 3 == 0 { "Browser" } else { "Editor" };
            record(&db, app, at(9 + second / 300, (second / 60) % 5, second % 60)).await?;
        }

        let readers = async {
            let mut seen = vec![];
            for _ in 0..50 {
                let total: i64 = db
                    .execute(|conn| {
                        Ok(conn.query_row(
                            "SELECT (SELECT COALESCE(SUM(duration), 0) FROM hourly_records)
                                  + (SELECT COUNT(*) FROM records)",
                            [],
                            |row| row.get(0),
                        )?)
                    })
                    .await?;
                seen.push(total);
                tokio::task::yield_now().await;
            }
            anyhow::Ok(seen)
        };

        let (outcome, seen) = tokio::join!(engine.run(), readers);
        assert_eq!(outcome?.observations, 600);
        assert!(seen?.into_iter().all(|total| total == 600));
        assert_eq!(db.pending_count().await?, 0);
        assert_eq!(total_duration(&db).await?, 600);
        Ok(())
    }
}
