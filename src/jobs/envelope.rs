use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::queue::{JobPayload, QueueName};

pub type JobId = Uuid;

/// The stored form of a job: payload plus delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    pub id: JobId,
    pub queue: QueueName,
    pub payload: serde_json::Value,
    /// Number of attempts that have already failed.
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl JobEnvelope {
    pub fn new<P: JobPayload>(payload: &P) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            queue: P::QUEUE,
            payload: serde_json::to_value(payload)?,
            attempts: 0,
            enqueued_at: Utc::now(),
            last_error: None,
        })
    }

    /// Copy of this envelope recording one more failed attempt.
    pub fn failed(&self, error: &str) -> Self {
        Self { attempts: self.attempts + 1, last_error: Some(error.to_string()), ..self.clone() }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// A job taken off a queue by a worker. `raw` is the exact stored string,
/// which the backend needs to acknowledge it.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub envelope: JobEnvelope,
    pub raw: String,
}
