use thiserror::Error;

/// Errors produced by the tracking core. Binaries wrap these into [anyhow::Error].
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Input rejected before anything was written. Retrying with the same input won't help.
    #[error("invalid observation: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A merge would have produced an impossible duration. Points at a bug or a corrupted
    /// database and must reach the operator.
    #[error("consistency violation: {0}")]
    Consistency(String),

    /// The database file was written by a newer screentime. Upgrade before opening it.
    #[error("database schema version {found} is newer than the supported version {supported}")]
    UnsupportedSchema { found: i32, supported: i32 },

    #[error("storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage worker unavailable: {0}")]
    Worker(String),
}

impl TrackerError {
    /// Whether the failed operation can be attempted again on the next trigger evaluation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::Storage(_) | TrackerError::Io(_) | TrackerError::Worker(_)
        )
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
