//! Error types for queue operations.

use crate::job::JobId;
use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Missing or invalid queue configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Publish called on a job that already carries an id
    #[error("Job already published with id {0}")]
    AlreadyPublished(JobId),

    /// Operation requires a published job
    #[error("Job has not been published")]
    NotPublished,

    /// Per-job keys are absent from the store
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Job could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Stored job data is malformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// A listener is already running for this queue
    #[error("Listener already running")]
    AlreadyListening,

    /// The listener task ended abnormally
    #[error("Listener terminated: {0}")]
    Listener(String),

    /// Backing store error
    #[error("Store error: {0}")]
    Store(#[from] conveyor_redis::RedisError),
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(conveyor_redis::RedisError::Redis(err))
    }
}
