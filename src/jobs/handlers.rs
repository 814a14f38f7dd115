//! Handlers bound to the four queues.
//!
//! Each one accepts its typed payload, logs the run and returns a success
//! descriptor. Text extraction, UPC lookups, expiry scans and mail delivery are
//! not implemented; the handlers carry the settings those steps need so the
//! bodies can be filled in without touching the wiring.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::error::JobError;
use super::handler::{Job, JobHandler, JobOutcome};
use super::queue::{NotificationJob, OcrJob, ProductLookupJob, WarrantyCheckJob};
use crate::config::{NotificationConfig, OcrConfig, SmtpConfig, UpcConfig};

pub struct OcrHandler {
    pub settings: OcrConfig,
}

#[async_trait]
impl JobHandler for OcrHandler {
    type Payload = OcrJob;

    async fn handle(&self, job: Job<OcrJob>) -> Result<JobOutcome, JobError> {
        info!(
            job_id = %job.id,
            attempt = job.attempt,
            language = %self.settings.language,
            psm = self.settings.psm,
            "Processing OCR job for receipt {}",
            job.payload.receipt_id
        );
        info!("OCR processing completed for receipt {}", job.payload.receipt_id);
        Ok(json!({ "success": true, "receiptId": job.payload.receipt_id }))
    }
}

pub struct WarrantyCheckHandler {
    pub notifications: NotificationConfig,
}

#[async_trait]
impl JobHandler for WarrantyCheckHandler {
    type Payload = WarrantyCheckJob;

    async fn handle(&self, job: Job<WarrantyCheckJob>) -> Result<JobOutcome, JobError> {
        info!(
            job_id = %job.id,
            attempt = job.attempt,
            reminder_days = ?self.notifications.reminder_days,
            "Processing warranty check job for user {}",
            job.payload.user_id
        );
        info!("Warranty check completed for user {}", job.payload.user_id);
        Ok(json!({ "success": true, "userId": job.payload.user_id }))
    }
}

pub struct NotificationHandler {
    pub smtp: SmtpConfig,
}

#[async_trait]
impl JobHandler for NotificationHandler {
    type Payload = NotificationJob;

    async fn handle(&self, job: Job<NotificationJob>) -> Result<JobOutcome, JobError> {
        info!(
            job_id = %job.id,
            attempt = job.attempt,
            smtp_host = %self.smtp.host,
            "Processing notification job {}",
            job.payload.notification_id
        );
        info!("Notification sent: {}", job.payload.notification_id);
        Ok(json!({ "success": true, "notificationId": job.payload.notification_id }))
    }
}

pub struct ProductLookupHandler {
    pub upc: UpcConfig,
}

#[async_trait]
impl JobHandler for ProductLookupHandler {
    type Payload = ProductLookupJob;

    async fn handle(&self, job: Job<ProductLookupJob>) -> Result<JobOutcome, JobError> {
        info!(
            job_id = %job.id,
            attempt = job.attempt,
            receipt_id = %job.payload.receipt_id,
            api_url = %self.upc.api_url,
            "Processing product lookup job for UPC {}",
            job.payload.upc_code
        );
        info!("Product lookup completed for UPC {}", job.payload.upc_code);
        Ok(json!({ "success": true, "upcCode": job.payload.upc_code }))
    }
}
