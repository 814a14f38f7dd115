//! HTTP endpoints. Everything under `/api` is a placeholder answering 501.

pub mod auth;
pub mod fallback;
pub mod health;
pub mod notifications;
pub mod products;
pub mod receipts;
pub mod warranties;

use crate::error::AppError;

/// 501 answer for an endpoint that exists but has no behaviour yet.
pub(crate) fn not_implemented(action: &str) -> AppError {
    AppError::NotImplemented(format!("{} endpoint not implemented yet", action))
}
