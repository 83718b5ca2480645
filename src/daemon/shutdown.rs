use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Detects signals sent to the process. Also returns once `cancelation` is cancelled elsewhere,
/// for example when the observation source runs dry.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    info!("Received interrupt, shutting down");
                    cancelation.cancel();
                }
                Err(e) => {
                    warn!("Can't listen for interrupts {e}");
                    cancelation.cancelled().await;
                }
            }
        },
        _ = cancelation.cancelled() => (),
    };
}
