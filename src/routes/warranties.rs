use axum::{
    response::Response,
    routing::{get, put},
    Router,
};

use super::fallback::not_found;
use super::not_implemented;
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_warranties))
        .route("/expiring", get(expiring_warranties))
        .route("/{id}", put(update_warranty))
        .method_not_allowed_fallback(not_found)
}

async fn list_warranties() -> AppResult<Response> {
    Err(not_implemented("Get warranties"))
}

async fn expiring_warranties() -> AppResult<Response> {
    Err(not_implemented("Get expiring warranties"))
}

async fn update_warranty() -> AppResult<Response> {
    Err(not_implemented("Update warranty"))
}
