//! Types exchanged with the API, plus the row types the pages render.
//!
//! API types mirror the server's camelCase JSON bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    pub last_name: String,
    pub email_verified: bool,
    #[serde(default)]
    pub notification_preferences: JsonValue,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredentials {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// The `{status, message}` error envelope returned by every failing endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardStats {
    pub total_receipts: u32,
    pub total_products: u32,
    pub expiring_soon: u32,
    pub total_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Processed,
    Processing,
    Failed,
}

impl ReceiptStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReceiptStatus::Processed => "processed",
            ReceiptStatus::Processing => "processing",
            ReceiptStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptRow {
    pub id: &'static str,
    pub merchant_name: &'static str,
    pub date: &'static str,
    pub total: f64,
    pub status: ReceiptStatus,
    pub products_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarrantyStatus {
    Active,
    Expiring,
    Expired,
}

impl WarrantyStatus {
    pub fn label(&self) -> &'static str {
        match self {
            WarrantyStatus::Active => "active",
            WarrantyStatus::Expiring => "expiring",
            WarrantyStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub id: &'static str,
    pub name: &'static str,
    pub brand: &'static str,
    pub purchase_date: &'static str,
    pub warranty_end_date: &'static str,
    pub days_remaining: i64,
    pub status: WarrantyStatus,
}
