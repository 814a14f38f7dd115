use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use super::backend::QueueBackend;
use super::envelope::{JobId, Reservation};
use super::error::JobError;
use super::handler::{ErasedHandler, JobHandler, JobOutcome, Typed};
use super::queue::{JobPayload, QueueName};
use super::retry::{RetryDecision, RetryPolicy};
use crate::logging::{panic_message, REJECTION_TARGET};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Lifecycle notifications published by workers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    Ready {
        queue: QueueName,
    },
    Completed {
        queue: QueueName,
        job_id: JobId,
        outcome: JobOutcome,
    },
    Failed {
        queue: QueueName,
        job_id: JobId,
        attempts: u32,
        error: String,
        retry_in_ms: Option<u64>,
        dead_lettered: bool,
    },
    Error {
        queue: QueueName,
        message: String,
    },
}

/// Consumes one queue with a fixed concurrency ceiling.
pub struct Worker {
    queue: QueueName,
    concurrency: usize,
    backend: Arc<dyn QueueBackend>,
    handler: Arc<dyn ErasedHandler>,
    retry: RetryPolicy,
    poll_interval: Duration,
}

/// What a spawned job task needs from its worker.
#[derive(Clone)]
struct JobContext {
    queue: QueueName,
    backend: Arc<dyn QueueBackend>,
    handler: Arc<dyn ErasedHandler>,
    retry: RetryPolicy,
    events: broadcast::Sender<WorkerEvent>,
}

impl Worker {
    /// Bind `handler` to its payload's queue, using that queue's concurrency ceiling.
    pub fn new<H: JobHandler>(handler: H, backend: Arc<dyn QueueBackend>) -> Self {
        let queue = <H::Payload as JobPayload>::QUEUE;
        Self {
            queue,
            concurrency: queue.concurrency(),
            backend,
            handler: Arc::new(Typed(handler)),
            retry: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn queue(&self) -> QueueName {
        self.queue
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn report_error(&self, events: &broadcast::Sender<WorkerEvent>, message: String) {
        error!(queue = %self.queue, "Worker {} error: {}", self.queue, message);
        let _ = events.send(WorkerEvent::Error { queue: self.queue, message });
    }

    async fn run(self, events: broadcast::Sender<WorkerEvent>, cancel: CancellationToken, tracker: TaskTracker) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let ctx = JobContext {
            queue: self.queue,
            backend: self.backend.clone(),
            handler: self.handler.clone(),
            retry: self.retry,
            events: events.clone(),
        };

        // Anything still reserved belongs to a worker that is gone.
        match self.backend.recover_stalled(self.queue).await {
            Ok(0) => {}
            Ok(n) => warn!(queue = %self.queue, recovered = n, "Requeued {} stalled job(s) on {}", n, self.queue),
            Err(e) => self.report_error(&events, format!("recovering stalled jobs failed: {}", e)),
        }

        info!(queue = %self.queue, concurrency = self.concurrency, "Worker {} is ready", self.queue);
        let _ = events.send(WorkerEvent::Ready { queue: self.queue });

        let mut last_promotion: Option<Instant> = None;
        loop {
            let permit: OwnedSemaphorePermit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            if last_promotion.map_or(true, |t| t.elapsed() >= self.poll_interval) {
                if let Err(e) = self.backend.promote_due(self.queue).await {
                    self.report_error(&events, format!("promoting delayed jobs failed: {}", e));
                }
                last_promotion = Some(Instant::now());
            }

            let reserved = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.backend.reserve(self.queue, self.poll_interval) => r,
            };

            match reserved {
                Ok(Some(reservation)) => {
                    let ctx = ctx.clone();
                    tracker.spawn(async move {
                        process(ctx, reservation).await;
                        drop(permit);
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    self.report_error(&events, e.to_string());
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        info!(queue = %self.queue, "Worker {} stopped taking new jobs", self.queue);
    }
}

async fn process(ctx: JobContext, reservation: Reservation) {
    let queue = ctx.queue;
    let job_id = reservation.envelope.id;

    let result = AssertUnwindSafe(ctx.handler.call(&reservation.envelope))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(panic.as_ref()))));

    match result {
        Ok(outcome) => {
            if let Err(e) = ctx.backend.ack(&reservation).await {
                // The job ran; a lost ack means it may run again.
                warn!(queue = %queue, job_id = %job_id, "Failed to acknowledge job {}: {}", job_id, e);
            }
            info!(queue = %queue, job_id = %job_id, "Job {} in queue {} completed", job_id, queue);
            let _ = ctx.events.send(WorkerEvent::Completed { queue, job_id, outcome });
        }
        Err(err) => {
            let message = err.to_string();
            if let JobError::Panicked(_) = err {
                error!(target: REJECTION_TARGET, queue = %queue, job_id = %job_id, "{}", message);
            }
            let updated = reservation.envelope.failed(&message);
            let decision = ctx.retry.decide(updated.attempts, err.is_retryable());
            let stored = match decision {
                RetryDecision::RetryAfter(delay) => ctx.backend.retry_later(&reservation, &updated, delay).await,
                RetryDecision::DeadLetter => ctx.backend.dead_letter(&reservation, &updated).await,
                RetryDecision::Discard => ctx.backend.ack(&reservation).await,
            };
            if let Err(e) = stored {
                warn!(queue = %queue, job_id = %job_id, "Failed to record failure of job {}: {}", job_id, e);
            }

            error!(
                queue = %queue,
                job_id = %job_id,
                attempts = updated.attempts,
                decision = ?decision,
                "Job {} in queue {} failed: {}",
                job_id,
                queue,
                message
            );
            let retry_in_ms = match decision {
                RetryDecision::RetryAfter(d) => Some(d.as_millis() as u64),
                _ => None,
            };
            let _ = ctx.events.send(WorkerEvent::Failed {
                queue,
                job_id,
                attempts: updated.attempts,
                error: message,
                retry_in_ms,
                dead_lettered: decision == RetryDecision::DeadLetter,
            });
        }
    }
}

#[derive(Debug, Error)]
#[error("{in_flight} worker task(s) still running after {timeout:?}")]
pub struct DrainTimeout {
    pub timeout: Duration,
    pub in_flight: usize,
}

/// Owns running workers and their in-flight jobs.
pub struct WorkerPool {
    cancel: CancellationToken,
    tracker: TaskTracker,
    events: broadcast::Sender<WorkerEvent>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(256);
        Self { cancel: CancellationToken::new(), tracker: TaskTracker::new(), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    pub fn spawn(&self, worker: Worker) {
        let fut = worker.run(self.events.clone(), self.cancel.child_token(), self.tracker.clone());
        self.tracker.spawn(fut);
    }

    /// Stop taking new jobs, then wait up to `timeout` for in-flight jobs to finish.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), DrainTimeout> {
        self.cancel.cancel();
        self.tracker.close();
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(DrainTimeout { timeout, in_flight: self.tracker.len() }),
        }
    }
}
