use std::env::args;

use anyhow::Result;
use clap::Parser;
use screentime::{
    config::TrackerConfig,
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};
use tracing::error;

fn main() -> Result<()> {
    let args = DaemonArgs::parse_from(args().collect::<Vec<_>>());
    run(args).inspect_err(|e| error!("Daemon stopped with an error {e:?}"))
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args.dir.map_or_else(create_application_default_path, ensure_dir)?;
    enable_logging(DAEMON_PREFIX, &app_dir.join("logs"), args.log, args.log_console)?;

    let config = TrackerConfig::default()
        .with_threshold(args.threshold)
        .with_zone(args.zone);

    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(async move { start_daemon(app_dir, config).await });
    // Stdin is read on a blocking thread that may still be parked on input.
    runtime.shutdown_background();
    result
}
