use axum::{
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::state::AppState;

/// Reject requests whose declared `Content-Length` exceeds `BODY_LIMIT`.
///
/// `DefaultBodyLimit` covers bodies that are actually read; this answers early
/// for every route, including ones that never read the body.
pub async fn body_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    if let Some(length) = declared {
        if length > state.config.server.body_limit as u64 {
            tracing::warn!(length, limit = state.config.server.body_limit, "Request body too large");
            return AppError::PayloadTooLarge.into_response();
        }
    }
    next.run(req).await
}
