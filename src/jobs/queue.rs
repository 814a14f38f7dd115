use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The four background queues. Each is consumed by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    #[serde(rename = "ocr-processing")]
    OcrProcessing,
    #[serde(rename = "warranty-check")]
    WarrantyCheck,
    #[serde(rename = "send-notification")]
    SendNotification,
    #[serde(rename = "product-lookup")]
    ProductLookup,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::OcrProcessing,
        QueueName::WarrantyCheck,
        QueueName::SendNotification,
        QueueName::ProductLookup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::OcrProcessing => "ocr-processing",
            QueueName::WarrantyCheck => "warranty-check",
            QueueName::SendNotification => "send-notification",
            QueueName::ProductLookup => "product-lookup",
        }
    }

    /// Fixed concurrency ceiling of the worker bound to this queue.
    pub fn concurrency(&self) -> usize {
        match self {
            QueueName::OcrProcessing => 2,
            QueueName::WarrantyCheck => 1,
            QueueName::SendNotification => 5,
            QueueName::ProductLookup => 3,
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| format!("unknown queue: {}", s))
    }
}

/// A typed job payload bound to one queue.
pub trait JobPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const QUEUE: QueueName;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrJob {
    pub receipt_id: String,
    pub image_url: String,
}

impl JobPayload for OcrJob {
    const QUEUE: QueueName = QueueName::OcrProcessing;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyCheckJob {
    pub user_id: String,
}

impl JobPayload for WarrantyCheckJob {
    const QUEUE: QueueName = QueueName::WarrantyCheck;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationJob {
    pub notification_id: String,
}

impl JobPayload for NotificationJob {
    const QUEUE: QueueName = QueueName::SendNotification;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLookupJob {
    pub receipt_id: String,
    pub upc_code: String,
}

impl JobPayload for ProductLookupJob {
    const QUEUE: QueueName = QueueName::ProductLookup;
}
