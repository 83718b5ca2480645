use std::fmt::Display;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    daemon::storage::registry::IconChange,
    summary::{AppUsage, UsageLevel},
    tracker::Tracker,
    utils::{percentage::seconds_percentage, time::format_duration},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct AppsCommand {
    #[arg(
        long,
        short,
        help = "Day to show. Examples are \"today\", \"yesterday\", \"15/03/2025\". Defaults to today"
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

/// Commands served from an opened [Tracker].
#[derive(Debug)]
pub enum ReportCommand {
    Rollup,
    Backlog,
    Usage(UsageLevel),
    Apps(AppsCommand),
    Days,
    Export,
    Icon {
        name: String,
        icon: String,
        path: Option<String>,
    },
}

pub async fn process_report_command(tracker: &Tracker, command: ReportCommand) -> Result<()> {
    match command {
        ReportCommand::Rollup => {
            let outcome = tracker.rollup().await?;
            if outcome.is_noop() {
                println!("Nothing to roll up");
            } else {
                println!(
                    "Rolled up {} observations into {} hourly records",
                    outcome.observations, outcome.buckets
                );
            }
        }
        ReportCommand::Backlog => {
            let pending = tracker.pending_count().await?;
            let remaining = tracker.pending_backlog().await?;
            println!("{pending}\tpending observations");
            println!("{remaining}\tobservations until rollup");
        }
        ReportCommand::Usage(level) => {
            for period in tracker.usage(level).await? {
                println!("{}\t{}", period.label, format_duration(period.seconds));
            }
        }
        ReportCommand::Apps(command) => {
            let date = parse_day(command.date, command.date_style)?;
            for line in app_usage_lines(tracker.usage_by_app(date).await?) {
                println!("{line}");
            }
        }
        ReportCommand::Days => {
            for day in tracker.unique_days().await? {
                println!("{}", day.format("%Y-%m-%d"));
            }
        }
        ReportCommand::Export => {
            for row in tracker.denormalized_export().await? {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        ReportCommand::Icon { name, icon, path } => {
            match tracker.set_icon(&name, &icon, path.as_deref()).await? {
                IconChange::Created(id) => println!("Registered {name} with id {id}"),
                IconChange::Updated => println!("Updated icon of {name}"),
                IconChange::Unchanged => println!("Icon of {name} left unchanged"),
            }
        }
    }
    Ok(())
}

fn parse_day(date: Option<String>, date_style: DateStyle) -> Result<NaiveDate> {
    let now = Local::now();
    match date.map(|s| parse_date_string(&s, now, date_style.into())) {
        Some(Ok(v)) => Ok(v.date_naive()),
        Some(Err(e)) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {e}"),
            )
            .into()),
        None => Ok(now.date_naive()),
    }
}

/// Formats usages most used first, with each entry's share of the listed total.
fn app_usage_lines(usages: Vec<AppUsage>) -> Vec<String> {
    let total: i64 = usages.iter().map(|v| v.seconds).sum();
    usages
        .into_iter()
        .rev()
        .map(|usage| {
            format!(
                "{}%\t{}\t{}",
                *seconds_percentage(usage.seconds, total) as i32,
                format_duration(usage.seconds),
                usage.app_name
            )
        })
        .collect()
}
