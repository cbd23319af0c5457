use thiserror::Error;

/// Errors surfaced by the illustrative header sync loop.
#[derive(Debug, Error)]
pub enum HeaderSyncError {
    #[error("queue operation failed: {0}")]
    Queue(#[from] chainsync_core::error::QueueError),

    #[error("task preparation failed: {0}")]
    Prepare(#[from] chainsync_core::error::PrepareError),

    #[error("request/response failed: {0}")]
    RequestResponse(#[from] chainsync_core::error::RequestResponseError),

    #[error("persisting headers failed: {0}")]
    PersistFailed(String),

    #[error("operation cancelled")]
    Cancelled,
}
