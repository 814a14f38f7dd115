//! Background job queues.
//!
//! Producers push typed payloads through [`JobQueue`]; the worker binary runs one
//! [`Worker`] per queue inside a [`WorkerPool`]. Retry and dead-letter behaviour is
//! decided here by [`RetryPolicy`], not by the queue store.

use std::sync::Arc;

use tracing::debug;

use crate::config::AppConfig;

pub mod backend;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod queue;
pub mod retry;
pub mod worker;

pub use backend::{MemoryBackend, QueueBackend, QueueCounts, RedisBackend};
pub use connection::RedisEndpoint;
pub use envelope::{JobEnvelope, JobId};
pub use error::{JobError, QueueError, QueueResult};
pub use handler::{Job, JobHandler, JobOutcome};
pub use queue::{JobPayload, NotificationJob, OcrJob, ProductLookupJob, QueueName, WarrantyCheckJob};
pub use retry::{Backoff, RetryDecision, RetryPolicy};
pub use worker::{DrainTimeout, Worker, WorkerEvent, WorkerPool};

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    backend: Arc<dyn QueueBackend>,
}

impl JobQueue {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    /// Push `payload` onto its queue and return the new job's id.
    pub async fn enqueue<P: JobPayload>(&self, payload: &P) -> QueueResult<JobId> {
        let envelope = JobEnvelope::new(payload)?;
        self.backend.enqueue(&envelope).await?;
        debug!(queue = %P::QUEUE, job_id = %envelope.id, "Job enqueued");
        Ok(envelope.id)
    }

    pub async fn counts(&self, queue: QueueName) -> QueueResult<QueueCounts> {
        self.backend.counts(queue).await
    }
}

/// One worker per queue, configured from `config`.
pub fn standard_workers(config: &AppConfig, backend: Arc<dyn QueueBackend>) -> Vec<Worker> {
    let queues = &config.queues;
    vec![
        Worker::new(handlers::OcrHandler { settings: config.ocr.clone() }, backend.clone()),
        Worker::new(
            handlers::WarrantyCheckHandler { notifications: config.notifications.clone() },
            backend.clone(),
        ),
        Worker::new(handlers::NotificationHandler { smtp: config.smtp.clone() }, backend.clone()),
        Worker::new(handlers::ProductLookupHandler { upc: config.upc.clone() }, backend),
    ]
    .into_iter()
    .map(|w| w.with_retry(queues.retry).with_poll_interval(queues.poll_interval))
    .collect()
}
