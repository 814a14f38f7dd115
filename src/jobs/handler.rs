use async_trait::async_trait;

use super::envelope::{JobEnvelope, JobId};
use super::error::JobError;
use super::queue::JobPayload;

/// Success descriptor returned by a handler, e.g. `{"success": true, "receiptId": "..."}`.
pub type JobOutcome = serde_json::Value;

/// A job as seen by its handler.
#[derive(Debug, Clone)]
pub struct Job<P> {
    pub id: JobId,
    /// 1 on the first run.
    pub attempt: u32,
    pub payload: P,
}

/// Processes the jobs of one queue.
///
/// Handlers should be idempotent: delivery is at-least-once and a failed job is
/// run again according to the worker's retry policy. Returning `Err` hands the
/// job back to that policy; handlers do not retry locally.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Payload: JobPayload;

    async fn handle(&self, job: Job<Self::Payload>) -> Result<JobOutcome, JobError>;
}

/// Type-erased handler so one worker type can run any queue.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    async fn call(&self, envelope: &JobEnvelope) -> Result<JobOutcome, JobError>;
}

pub(crate) struct Typed<H>(pub H);

#[async_trait]
impl<H: JobHandler> ErasedHandler for Typed<H> {
    async fn call(&self, envelope: &JobEnvelope) -> Result<JobOutcome, JobError> {
        let payload: H::Payload =
            serde_json::from_value(envelope.payload.clone()).map_err(JobError::InvalidPayload)?;
        self.0.handle(Job { id: envelope.id, attempt: envelope.attempts + 1, payload }).await
    }
}
