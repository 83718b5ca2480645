use anyhow::Result;
use futures::StreamExt;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc,
};
use tokio_stream::wrappers::SplitStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    daemon::storage::record_event::RecordEvent,
    error::{TrackerError, TrackerResult},
};

/// Reads newline-delimited JSON observations written by the activity sampler and forwards them
/// to the processing module.
pub struct ObservationReader<R> {
    next: mpsc::Sender<RecordEvent>,
    source: R,
    shutdown: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> ObservationReader<R> {
    pub fn new(next: mpsc::Sender<RecordEvent>, source: R, shutdown: CancellationToken) -> Self {
        Self {
            next,
            source,
            shutdown,
        }
    }

    /// Executes the reader loop until the source is exhausted or shutdown is requested. Returning
    /// drops the sender, which lets the processing module finish. Only a failing source ends the
    /// loop early, bad lines are skipped.
    pub async fn run(self) -> Result<()> {
        let mut lines = SplitStream::new(self.source.split(b'\n'));
        let mut skipped = 0usize;
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Reader stopped by shutdown");
                    return Ok(())
                }
                line = lines.next() => line,
            };

            let Some(line) = line else {
                info!("Observation source exhausted, skipped {skipped} lines");
                return Ok(());
            };
            let line = match decode_line(line?) {
                Ok(line) => line,
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping observation: {e}");
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match RecordEvent::parse_line(&line) {
                Ok(record) => {
                    debug!("Sending observation {:?}", record);
                    self.next
                        .send(record)
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                }
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping observation {line}: {e}")
                }
            }
        }
    }
}

fn decode_line(bytes: Vec<u8>) -> TrackerResult<String> {
    String::from_utf8(bytes)
        .map_err(|e| TrackerError::Validation(format!("line is not valid UTF-8: {e}")))
}
