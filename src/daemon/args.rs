use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::{config::BucketZone, rollup::trigger::DEFAULT_THRESHOLD};

#[derive(Parser)]
#[command(name = "screentime-daemon", version)]
#[command(about = "Stores observations read from stdin and rolls them up into hourly usage")]
pub struct DaemonArgs {
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Pending observations that trigger a rollup.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: u64,
    #[arg(long, default_value_t = BucketZone::Local)]
    pub zone: BucketZone,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
