use log::error;
use thiserror::Error;

/// Errors surfaced to callers of the upload and submission operations.
///
/// Validation variants are raised before anything is written or queued.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} is not a supported image extension")]
    UnsupportedExtension(String),
    #[error("invalid image reference: {0:?}")]
    InvalidName(String),
    #[error("target width must be between 1 and {0}")]
    InvalidWidth(u32),
    #[error("dispatch queue is full, try again later")]
    QueueFull,
    #[error("resize worker has stopped accepting tasks")]
    WorkerStopped,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ServiceError::UnsupportedExtension(_)
                | ServiceError::InvalidName(_)
                | ServiceError::InvalidWidth(_)
        )
    }
}

/// Log the full context chain and hand the error back to the caller.
pub fn handle_error(error: anyhow::Error) -> anyhow::Error {
    error!("{:?}", error);
    error
}
