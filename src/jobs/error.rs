use thiserror::Error;

/// Errors raised by the queue store itself (connection, encoding, configuration).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("job encoding error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("invalid redis url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Errors returned by job handlers.
#[derive(Debug, Error)]
pub enum JobError {
    /// The stored payload does not match the handler's payload type. Never retried.
    #[error("invalid job payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    #[error("{0}")]
    Failed(#[from] anyhow::Error),
    #[error("job handler panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, JobError::InvalidPayload(_))
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
