//! Read-only reports over `hourly_records`. Nothing in here writes to the database.

pub mod top;

use std::{collections::BTreeMap, fmt::Display};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::{
    daemon::storage::{database::Database, entities::HourlyAggregateEntity},
    error::TrackerResult,
};

use top::filter_top;

/// Number of applications listed individually by [usage_by_app].
pub const TOP_APPS: usize = 5;

/// Applications used less than this on a day are left out of [usage_by_app].
pub const MIN_APP_USAGE_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub seconds: i64,
}

/// Usage summed over a calendar period. `start` is the first day of the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodUsage {
    pub label: String,
    pub start: NaiveDate,
    pub seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppUsage {
    pub app_name: String,
    pub seconds: i64,
}

/// One aggregate joined with its application name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub hour: NaiveDateTime,
    pub app_name: String,
    pub duration: i64,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum UsageLevel {
    #[default]
    Daily,
    Monthly,
    Yearly,
}

impl Display for UsageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageLevel::Daily => write!(f, "daily"),
            UsageLevel::Monthly => write!(f, "monthly"),
            UsageLevel::Yearly => write!(f, "yearly"),
        }
    }
}

/// Total seconds per calendar date, oldest first.
pub fn daily_usage(conn: &Connection) -> TrackerResult<Vec<DailyUsage>> {
    let mut stmt = conn.prepare(
        "SELECT date(hour) AS day, SUM(duration)
         FROM hourly_records
         GROUP BY day
         ORDER BY day ASC",
    )?;
    let days = stmt
        .query_map([], |row| {
            Ok(DailyUsage {
                date: row.get(0)?,
                seconds: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(days)
}

/// Re-buckets daily totals into the periods of `level`.
pub fn group_by_level(days: &[DailyUsage], level: UsageLevel) -> Vec<PeriodUsage> {
    let mut periods = BTreeMap::<NaiveDate, i64>::new();
    for day in days {
        let start = match level {
            UsageLevel::Daily => Some(day.date),
            UsageLevel::Monthly => day.date.with_day(1),
            UsageLevel::Yearly => NaiveDate::from_ymd_opt(day.date.year(), 1, 1),
        }
        .unwrap_or(day.date);
        *periods.entry(start).or_insert(0) += day.seconds;
    }

    let format = match level {
        UsageLevel::Daily => "%Y-%m-%d",
        UsageLevel::Monthly => "%Y-%m",
        UsageLevel::Yearly => "%Y",
    };

    periods
        .into_iter()
        .map(|(start, seconds)| PeriodUsage {
            label: start.format(format).to_string(),
            start,
            seconds,
        })
        .collect()
}

/// Per-application usage for `date`, ascending, with the top [TOP_APPS] kept separately and the
/// rest folded into "Other".
pub fn usage_by_app(conn: &Connection, date: NaiveDate) -> TrackerResult<Vec<AppUsage>> {
    let mut stmt = conn.prepare(
        "SELECT apps.app_name, SUM(hourly_records.duration) AS total
         FROM hourly_records
         JOIN apps ON apps.id = hourly_records.app_id
         WHERE date(hourly_records.hour) = ?1
         GROUP BY apps.app_name
         HAVING total >= ?2
         ORDER BY total ASC, apps.app_name ASC",
    )?;
    let usages = stmt
        .query_map(params![date, MIN_APP_USAGE_SECONDS], |row| {
            Ok(AppUsage {
                app_name: row.get(0)?,
                seconds: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(filter_top(usages, TOP_APPS))
}

pub fn unique_days(conn: &Connection) -> TrackerResult<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT date(hour) AS day FROM hourly_records ORDER BY day ASC",
    )?;
    let days = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(days)
}

/// Every aggregate with its application name, in storage order.
pub fn denormalized_export(conn: &Connection) -> TrackerResult<Vec<ExportRow>> {
    let mut stmt = conn.prepare(
        "SELECT hourly_records.hour, apps.app_name, hourly_records.duration
         FROM hourly_records
         JOIN apps ON apps.id = hourly_records.app_id
         ORDER BY hourly_records.rowid",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ExportRow {
                hour: row.get(0)?,
                app_name: row.get(1)?,
                duration: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn hourly_aggregates(conn: &Connection) -> TrackerResult<Vec<HourlyAggregateEntity>> {
    let mut stmt = conn.prepare(
        "SELECT hour, app_id, duration FROM hourly_records ORDER BY hour ASC, app_id ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(HourlyAggregateEntity {
                hour: row.get(0)?,
                app_id: row.get(1)?,
                duration: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    pub async fn daily_usage(&self) -> TrackerResult<Vec<DailyUsage>> {
        self.execute(|conn| daily_usage(conn)).await
    }

    pub async fn usage(&self, level: UsageLevel) -> TrackerResult<Vec<PeriodUsage>> {
        let days = self.daily_usage().await?;
        Ok(group_by_level(&days, level))
    }

    pub async fn usage_by_app(&self, date: NaiveDate) -> TrackerResult<Vec<AppUsage>> {
        self.execute(move |conn| usage_by_app(conn, date)).await
    }

    pub async fn unique_days(&self) -> TrackerResult<Vec<NaiveDate>> {
        self.execute(|conn| unique_days(conn)).await
    }

    pub async fn denormalized_export(&self) -> TrackerResult<Vec<ExportRow>> {
        self.execute(|conn| denormalized_export(conn)).await
    }

    pub async fn hourly_aggregates(&self) -> TrackerResult<Vec<HourlyAggregateEntity>> {
        self.execute(|conn| hourly_aggregates(conn)).await
    }
}
