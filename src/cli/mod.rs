pub mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use report::{process_report_command, AppsCommand, ReportCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    config::{BucketZone, TrackerConfig},
    daemon::start_daemon,
    rollup::trigger::DEFAULT_THRESHOLD,
    summary::UsageLevel,
    tracker::Tracker,
    utils::{
        dir::{create_application_default_path, ensure_dir, DATABASE_FILE},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Screentime", version, long_about = None)]
#[command(about = "Application for tracking screen time per application", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_THRESHOLD,
        help = "Pending observations that make a rollup due"
    )]
    threshold: u64,
    #[arg(
        long,
        global = true,
        default_value_t = BucketZone::Local,
        help = "Time zone used to assign observations to hours"
    )]
    zone: BucketZone,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(
        about = "Read observations from stdin in the current console. Each line is a JSON object with app_name, app_path and timestamp"
    )]
    Serve {},
    #[command(about = "Fold pending observations into hourly usage")]
    Rollup {},
    #[command(about = "Show how many observations are pending and when the next rollup is due")]
    Backlog {},
    #[command(about = "Show total usage per day, month or year")]
    Usage {
        #[arg(long, default_value_t = UsageLevel::Daily)]
        level: UsageLevel,
    },
    #[command(about = "Show the most used applications of a day")]
    Apps {
        #[command(flatten)]
        command: AppsCommand,
    },
    #[command(about = "List days that have recorded usage")]
    Days {},
    #[command(about = "Print every hourly record as JSON lines")]
    Export {},
    #[command(about = "Attach an icon to an application")]
    Icon {
        name: String,
        icon: String,
        #[arg(long, help = "Executable location used if the application is not known yet")]
        path: Option<String>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir.join("logs"), logging_level, args.log)?;

    let config = TrackerConfig::default()
        .with_threshold(args.threshold)
        .with_zone(args.zone);

    let command = match args.commands {
        Commands::Serve {} => return start_daemon(dir, config).await,
        Commands::Rollup {} => ReportCommand::Rollup,
        Commands::Backlog {} => ReportCommand::Backlog,
        Commands::Usage { level } => ReportCommand::Usage(level),
        Commands::Apps { command } => ReportCommand::Apps(command),
        Commands::Days {} => ReportCommand::Days,
        Commands::Export {} => ReportCommand::Export,
        Commands::Icon { name, icon, path } => ReportCommand::Icon { name, icon, path },
    };

    let tracker = Tracker::open(dir.join(DATABASE_FILE), config)
        .with_context(|| format!("Failed to open database in {}", dir.display()))?;
    process_report_command(&tracker, command).await
}
