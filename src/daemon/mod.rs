use std::path::PathBuf;

use anyhow::Result;
use collection::reader::ObservationReader;
use processing::{module::UsageRecorder, saver::ObservationSaver, ProcessingModule};
use storage::record_event::RecordEvent;
use tokio::{
    io::{AsyncBufRead, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{config::TrackerConfig, tracker::Tracker, utils::dir::DATABASE_FILE};

pub mod args;
pub mod collection;
pub mod processing;
pub mod shutdown;
pub mod storage;

const CHANNEL_CAPACITY: usize = 64;

/// Represents the starting point for the daemon. Observations are read from stdin until it
/// closes or the process is interrupted.
pub async fn start_daemon(dir: PathBuf, config: TrackerConfig) -> Result<()> {
    let tracker = Tracker::open(dir.join(DATABASE_FILE), config)?;
    let source = BufReader::new(tokio::io::stdin());

    let shutdown_token = CancellationToken::new();

    let (_, pipeline_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        async {
            let result = run_pipeline(tracker, source, &shutdown_token).await;
            shutdown_token.cancel();
            result
        },
    );

    pipeline_result
}

/// Wires `source` through the reader and the processing module into `recorder`.
pub async fn run_pipeline<U, R>(
    recorder: U,
    source: R,
    shutdown_token: &CancellationToken,
) -> Result<()>
where
    U: UsageRecorder,
    R: AsyncBufRead + Unpin,
{
    let (sender, receiver) = mpsc::channel::<RecordEvent>(CHANNEL_CAPACITY);

    let reader = create_reader(sender, source, shutdown_token);

    let processor = create_processor(receiver, recorder);

    let (reading_result, processing_result) = tokio::join!(reader.run(), processor.run());

    if let Err(e) = &reading_result {
        error!("Reading module got an error {:?}", e);
    }

    if let Err(e) = &processing_result {
        error!("Processing module got an error {:?}", e);
    }

    reading_result.and(processing_result)
}

fn create_reader<R: AsyncBufRead + Unpin>(
    sender: mpsc::Sender<RecordEvent>,
    source: R,
    shutdown_token: &CancellationToken,
) -> ObservationReader<R> {
    ObservationReader::new(sender, source, shutdown_token.clone())
}

fn create_processor<U: UsageRecorder>(
    receiver: mpsc::Receiver<RecordEvent>,
    recorder: U,
) -> ProcessingModule<ObservationSaver<U>> {
    ProcessingModule::new(receiver, ObservationSaver::new(recorder))
}
