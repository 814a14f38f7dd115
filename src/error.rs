use std::any::Any;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::panic_message;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";
pub const INTERNAL_MESSAGE: &str = "Something went wrong!";

/// The primary error type of the HTTP layer.
///
/// Every variant except `Internal` is operational: its message is safe to show
/// to the client. `Internal` is logged with an error id and rendered generically.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// No route matches the request.
    #[error("Can't find {0} on this server!")]
    RouteNotFound(String),
    #[error("Request body is too large")]
    PayloadTooLarge,
    #[error("{}", RATE_LIMIT_MESSAGE)]
    RateLimited { retry_after_seconds: u64 },
    #[error("{0}")]
    NotImplemented(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Internal error details attached to 500 responses as an extension. The
/// `expose_error_details` middleware copies them into the body in development.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub error_id: String,
    pub detail: String,
}

#[derive(Serialize)]
struct Envelope<'a> {
    status: &'a str,
    message: &'a str,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `"fail"` for client errors, `"error"` for server errors.
pub fn status_label(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        "fail"
    } else {
        "error"
    }
}

fn envelope(status: StatusCode, message: &str) -> Response {
    (status, Json(Envelope { status: status_label(status), message })).into_response()
}

fn internal_response(error_id: String, detail: String) -> Response {
    let mut response = envelope(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE);
    response.extensions_mut().insert(ErrorDetail { error_id, detail });
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4().to_string();
                tracing::error!(error_id = %error_id, "Internal error: {:?}", e);
                internal_response(error_id, format!("{:?}", e))
            }
            AppError::RateLimited { retry_after_seconds } => {
                let mut response = envelope(status, RATE_LIMIT_MESSAGE);
                response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
                response
            }
            other => envelope(status, &other.to_string()),
        }
    }
}

/// Render a caught handler panic as the generic 500 envelope.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let error_id = uuid::Uuid::new_v4().to_string();
    let detail = panic_message(payload.as_ref());
    tracing::error!(error_id = %error_id, "Request handler panicked: {}", detail);
    internal_response(error_id, detail)
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => AppError::ServiceUnavailable("Database connection pool timed out".to_string()),
            other => AppError::Internal(other.into()),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}
