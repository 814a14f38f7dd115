use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long to wait before the next attempt of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    /// The same delay after every failure.
    Fixed { delay: Duration },
    /// `base * 2^(attempt - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

/// Retry policy applied by every worker when a handler fails.
///
/// `max_attempts` counts the first run, so `max_attempts = 1` never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Exhausted jobs go to the queue's dead-letter list instead of being dropped.
    pub dead_letter: bool,
}

/// What a worker does with a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    DeadLetter,
    Discard,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Mirror defaults from config/default.toml
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(1000),
                max: Duration::from_millis(60_000),
            },
            dead_letter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { base, max } => {
                let exp = attempt.saturating_sub(1).min(31);
                base.checked_mul(1u32 << exp).unwrap_or(max).min(max)
            }
        }
    }

    /// Decide the fate of a job that has now failed `attempts` times.
    pub fn decide(&self, attempts: u32, retryable: bool) -> RetryDecision {
        if retryable && attempts < self.max_attempts {
            RetryDecision::RetryAfter(self.delay_for(attempts))
        } else if self.dead_letter {
            RetryDecision::DeadLetter
        } else {
            RetryDecision::Discard
        }
    }
}
