//! Queue stores.
//!
//! Every queue is a set of lists: `wait` (ready to run), `active` (reserved by a
//! worker), `delayed` (waiting out a retry backoff) and `dead` (exhausted). A job
//! stays in `active` until its worker acknowledges it. A worker starting up hands
//! whatever is still in `active` back to `wait`, so a job orphaned by a crash or a
//! lost acknowledgement runs again: delivery is at-least-once.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::envelope::{JobEnvelope, Reservation};
use super::error::QueueResult;
use super::queue::QueueName;

pub mod memory;
pub mod redis_store;

pub use self::memory::MemoryBackend;
pub use self::redis_store::RedisBackend;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub waiting: usize,
    pub active: usize,
    pub delayed: usize,
    pub dead: usize,
}

#[async_trait]
pub trait QueueBackend: Send + Sync + 'static {
    async fn enqueue(&self, envelope: &JobEnvelope) -> QueueResult<()>;

    /// Move the oldest waiting job to `active`, waiting up to `wait` for one to arrive.
    async fn reserve(&self, queue: QueueName, wait: Duration) -> QueueResult<Option<Reservation>>;

    async fn ack(&self, reservation: &Reservation) -> QueueResult<()>;

    /// Replace the reserved job with `updated` and make it runnable again after `delay`.
    async fn retry_later(&self, reservation: &Reservation, updated: &JobEnvelope, delay: Duration) -> QueueResult<()>;

    async fn dead_letter(&self, reservation: &Reservation, updated: &JobEnvelope) -> QueueResult<()>;

    /// Move delayed jobs whose backoff has elapsed back to `wait`. Returns how many moved.
    async fn promote_due(&self, queue: QueueName) -> QueueResult<usize>;

    /// Move every job left in `active` back to the head of `wait`, oldest first.
    /// Returns how many moved.
    async fn recover_stalled(&self, queue: QueueName) -> QueueResult<usize>;

    async fn counts(&self, queue: QueueName) -> QueueResult<QueueCounts>;
}
