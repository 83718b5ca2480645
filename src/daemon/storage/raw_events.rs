use rusqlite::{params, Connection};

use crate::error::{TrackerError, TrackerResult};

use super::{
    database::Database,
    entities::{AppId, RawObservationEntity},
    record_event::RecordEvent,
    registry::AppRepository,
};

/// Append-only log of observations that haven't been rolled up yet.
pub struct RawEventRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RawEventRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn append(&self, app_id: AppId, timestamp: i64) -> TrackerResult<i64> {
        self.conn.execute(
            "INSERT INTO records (timestamp, app_id) VALUES (?1, ?2)",
            params![timestamp, app_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn pending_count(&self) -> TrackerResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| TrackerError::Consistency(format!("negative record count {count}")))
    }

    /// Every pending observation in insertion order.
    pub fn snapshot(&self) -> TrackerResult<Vec<RawObservationEntity>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, timestamp, app_id FROM records ORDER BY id")?;
        let records = stmt
            .query_map([], |row| {
                Ok(RawObservationEntity {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    app_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Removes observations up to and including `max_id`. Anything appended later stays.
    pub fn truncate_through(&self, max_id: i64) -> TrackerResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM records WHERE id <= ?1", params![max_id])?)
    }
}

impl Database {
    /// Stores one observed second, registering the application if it is new. Invalid events are
    /// rejected before anything is written.
    pub async fn record_observation(&self, event: RecordEvent) -> TrackerResult<()> {
        event.validate()?;
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let app_id =
                AppRepository::new(&tx).resolve_or_create(&event.app_name, &event.app_path)?;
            RawEventRepository::new(&tx).append(app_id, event.timestamp)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn pending_count(&self) -> TrackerResult<u64> {
        self.execute(|conn| RawEventRepository::new(conn).pending_count())
            .await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::{
        daemon::storage::{database::Database, record_event::RecordEvent},
        error::TrackerError,
    };

    use super::RawEventRepository;

    #[tokio::test]
    async fn test_append_counts_duplicates() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::open(dir.path().join("screentime.db"))?;

        for _ in 0..3 {
            db.record_observation(RecordEvent::new("Editor", "/bin/editor", 1_710_493_200))
                .await?;
        }
        db.record_observation(RecordEvent::new("Browser", "/bin/browser", 1_710_493_201))
            .await?;

        assert_eq!(db.pending_count().await?, 4);
        assert_eq!(db.applications().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_observation_writes_nothing() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::open(dir.path().join("screentime.db"))?;

        let empty = db.record_observation(RecordEvent::new("", "/bin/editor", 5)).await;
        let negative = db.record_observation(RecordEvent::new("Editor", "/bin/editor", -5)).await;

        assert!(matches!(empty, Err(TrackerError::Validation(_))));
        assert!(matches!(negative, Err(TrackerError::Validation(_))));
        assert_eq!(db.pending_count().await?, 0);
        assert!(db.applications().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_truncate_keeps_later_rows() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::open(dir.path().join("screentime.db"))?;
        for second in 0..5 {
            db.record_observation(RecordEvent::new("Editor", "/bin/editor", 100 + second))
                .await?;
        }

        let remaining = db
            .execute(|conn| {
                let repository = RawEventRepository::new(conn);
                let snapshot = repository.snapshot()?;
                repository.truncate_through(snapshot[2].id)?;
                repository.snapshot()
            })
            .await?;

        assert_eq!(
            remaining.iter().map(|v| v.timestamp).collect::<Vec<_>>(),
            vec![103, 104]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_observations_survive_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("screentime.db");
        {
            let db = Database::open(path.clone())?;
            db.record_observation(RecordEvent::new("Editor", "/bin/editor", 100))
                .await?;
        }

        let db = Database::open(path)?;
        assert_eq!(db.pending_count().await?, 1);
        Ok(())
    }
}
