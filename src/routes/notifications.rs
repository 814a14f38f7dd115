use axum::{
    response::Response,
    routing::{delete, get, put},
    Router,
};

use super::fallback::not_found;
use super::not_implemented;
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/{id}/read", put(mark_read))
        .route("/{id}", delete(delete_notification))
        .method_not_allowed_fallback(not_found)
}

async fn list_notifications() -> AppResult<Response> {
    Err(not_implemented("Get notifications"))
}

async fn mark_read() -> AppResult<Response> {
    Err(not_implemented("Mark notification as read"))
}

async fn delete_notification() -> AppResult<Response> {
    Err(not_implemented("Delete notification"))
}
