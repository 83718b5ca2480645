use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    config::TrackerConfig,
    daemon::{
        processing::module::UsageRecorder,
        storage::{database::Database, record_event::RecordEvent, registry::IconChange},
    },
    error::TrackerResult,
    rollup::{trigger::BacklogTrigger, RollupEngine, RollupOutcome},
    summary::{AppUsage, DailyUsage, ExportRow, PeriodUsage, UsageLevel},
};

/// Entry point for hosts embedding the tracker: ingestion, maintenance and reporting over one
/// database.
#[derive(Clone)]
pub struct Tracker {
    db: Database,
    engine: RollupEngine,
    trigger: BacklogTrigger,
}

impl Tracker {
    pub fn open(db_path: PathBuf, config: TrackerConfig) -> TrackerResult<Self> {
        let db = Database::open(db_path)?;
        Ok(Self::with_database(db, config))
    }

    pub fn with_database(db: Database, config: TrackerConfig) -> Self {
        Self {
            engine: RollupEngine::new(db.clone(), config.zone),
            trigger: BacklogTrigger::new(config.threshold),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn record_observation(
        &self,
        app_name: &str,
        app_path: &str,
        timestamp: i64,
    ) -> TrackerResult<()> {
        self.db
            .record_observation(RecordEvent::new(app_name, app_path, timestamp))
            .await
    }

    pub async fn set_icon(
        &self,
        app_name: &str,
        icon_path: &str,
        fallback_path: Option<&str>,
    ) -> TrackerResult<IconChange> {
        self.db.set_app_icon(app_name, icon_path, fallback_path).await
    }

    pub async fn pending_count(&self) -> TrackerResult<u64> {
        self.db.pending_count().await
    }

    pub async fn pending_backlog(&self) -> TrackerResult<u64> {
        self.trigger.backlog_remaining(&self.db).await
    }

    pub async fn rollup(&self) -> TrackerResult<RollupOutcome> {
        self.engine.run().await
    }

    pub async fn daily_usage(&self) -> TrackerResult<Vec<DailyUsage>> {
        self.db.daily_usage().await
    }

    pub async fn usage(&self, level: UsageLevel) -> TrackerResult<Vec<PeriodUsage>> {
        self.db.usage(level).await
    }

    pub async fn usage_by_app(&self, date: NaiveDate) -> TrackerResult<Vec<AppUsage>> {
        self.db.usage_by_app(date).await
    }

    pub async fn unique_days(&self) -> TrackerResult<Vec<NaiveDate>> {
        self.db.unique_days().await
    }

    pub async fn denormalized_export(&self) -> TrackerResult<Vec<ExportRow>> {
        self.db.denormalized_export().await
    }
}

#[async_trait]
impl UsageRecorder for Tracker {
    async fn record(&self, event: RecordEvent) -> TrackerResult<()> {
        self.db.record_observation(event).await
    }

    async fn pending_backlog(&self) -> TrackerResult<u64> {
        Tracker::pending_backlog(self).await
    }

    async fn rollup(&self) -> TrackerResult<RollupOutcome> {
        Tracker::rollup(self).await
    }
}
