use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::error::{status_label, ErrorDetail, INTERNAL_MESSAGE};
use crate::state::AppState;

/// In development, add the debug text and error id of internal errors to the
/// response body. Other environments keep the generic envelope.
pub async fn expose_error_details(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let res = next.run(req).await;
    if !state.config.is_development() {
        return res;
    }
    let Some(detail) = res.extensions().get::<ErrorDetail>().cloned() else {
        return res;
    };

    let body = json!({
        "status": status_label(res.status()),
        "message": INTERNAL_MESSAGE,
        "error": detail.detail,
        "errorId": detail.error_id,
    });
    let (mut parts, _) = res.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body.to_string()))
}
