use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{QueueBackend, QueueCounts};
use crate::jobs::envelope::{JobEnvelope, Reservation};
use crate::jobs::error::QueueResult;
use crate::jobs::queue::QueueName;

#[derive(Default)]
struct Lists {
    wait: VecDeque<String>,
    active: Vec<String>,
    delayed: Vec<(Instant, String)>,
    dead: Vec<String>,
}

impl Lists {
    fn remove_active(&mut self, raw: &str) {
        if let Some(pos) = self.active.iter().position(|r| r == raw) {
            self.active.remove(pos);
        }
    }
}

/// In-process queue store with the same list semantics as the Redis store.
#[derive(Default)]
pub struct MemoryBackend {
    queues: Mutex<HashMap<QueueName, Lists>>,
    notify: Notify,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_lists<T>(&self, queue: QueueName, f: impl FnOnce(&mut Lists) -> T) -> T {
        // A poisoned lock only means another thread panicked mid-update; the lists stay usable.
        let mut guard = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        f(guard.entry(queue).or_default())
    }

    /// Jobs that exhausted their retries, oldest first.
    pub fn dead_letters(&self, queue: QueueName) -> Vec<JobEnvelope> {
        self.with_lists(queue, |l| l.dead.iter().filter_map(|raw| JobEnvelope::decode(raw).ok()).collect())
    }

    fn try_take(&self, queue: QueueName) -> QueueResult<Option<Reservation>> {
        let raw = self.with_lists(queue, |l| {
            let raw = l.wait.pop_front()?;
            l.active.push(raw.clone());
            Some(raw)
        });
        match raw {
            Some(raw) => Ok(Some(Reservation { envelope: JobEnvelope::decode(&raw)?, raw })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    async fn enqueue(&self, envelope: &JobEnvelope) -> QueueResult<()> {
        let raw = envelope.encode()?;
        self.with_lists(envelope.queue, |l| l.wait.push_back(raw));
        self.notify.notify_waiters();
        Ok(())
    }

    async fn reserve(&self, queue: QueueName, wait: Duration) -> QueueResult<Option<Reservation>> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(reservation) = self.try_take(queue)? {
                return Ok(Some(reservation));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, reservation: &Reservation) -> QueueResult<()> {
        self.with_lists(reservation.envelope.queue, |l| l.remove_active(&reservation.raw));
        Ok(())
    }

    async fn retry_later(&self, reservation: &Reservation, updated: &JobEnvelope, delay: Duration) -> QueueResult<()> {
        let raw = updated.encode()?;
        self.with_lists(reservation.envelope.queue, |l| {
            l.remove_active(&reservation.raw);
            l.delayed.push((Instant::now() + delay, raw));
        });
        Ok(())
    }

    async fn dead_letter(&self, reservation: &Reservation, updated: &JobEnvelope) -> QueueResult<()> {
        let raw = updated.encode()?;
        self.with_lists(reservation.envelope.queue, |l| {
            l.remove_active(&reservation.raw);
            l.dead.push(raw);
        });
        Ok(())
    }

    async fn promote_due(&self, queue: QueueName) -> QueueResult<usize> {
        let now = Instant::now();
        let moved = self.with_lists(queue, |l| {
            let (due, pending): (Vec<_>, Vec<_>) = l.delayed.drain(..).partition(|(at, _)| *at <= now);
            l.delayed = pending;
            let n = due.len();
            l.wait.extend(due.into_iter().map(|(_, raw)| raw));
            n
        });
        if moved > 0 {
            self.notify.notify_waiters();
        }
        Ok(moved)
    }

    async fn recover_stalled(&self, queue: QueueName) -> QueueResult<usize> {
        let moved = self.with_lists(queue, |l| {
            let n = l.active.len();
            for raw in l.active.drain(..).rev() {
                l.wait.push_front(raw);
            }
            n
        });
        if moved > 0 {
            self.notify.notify_waiters();
        }
        Ok(moved)
    }

    async fn counts(&self, queue: QueueName) -> QueueResult<QueueCounts> {
        Ok(self.with_lists(queue, |l| QueueCounts {
            waiting: l.wait.len(),
            active: l.active.len(),
            delayed: l.delayed.len(),
            dead: l.dead.len(),
        }))
    }
}
