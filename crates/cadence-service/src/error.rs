use std::time::Duration;

use thiserror::Error;

/// Service layer errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The slow cycle could not produce a new timeline.
    #[error("Refresh failed: {0}")]
    Refresh(#[from] RefreshFailure),

    #[error("Timezone error: {0}")]
    Conversion(#[from] cadence_rfc::rfc::ical::expand::ConversionError),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Why one slow cycle failed. Every variant is retried with backoff.
#[derive(Error, Debug)]
pub enum RefreshFailure {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("refresh timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The blocking build task panicked or was cancelled by the runtime.
    #[error("refresh build failed: {0}")]
    Build(#[from] tokio::task::JoinError),

    /// The build noticed it was no longer awaited and stopped early.
    #[error("refresh build abandoned")]
    Abandoned,
}

/// Errors reported by an [`EventSource`](crate::refresh::EventSource).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source {id} is unavailable: {reason}")]
    Unavailable { id: String, reason: String },

    #[error("source {id} returned undecodable data: {reason}")]
    Decode { id: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SourceError> for ServiceError {
    fn from(error: SourceError) -> Self {
        Self::Refresh(RefreshFailure::Source(error))
    }
}
