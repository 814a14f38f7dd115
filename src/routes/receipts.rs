use axum::{
    response::Response,
    routing::{get, post},
    Router,
};

use super::fallback::not_found;
use super::not_implemented;
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_receipts).post(create_receipt))
        .route("/upload", post(upload_receipt))
        .route("/{id}", get(get_receipt).put(update_receipt).delete(delete_receipt))
        .route("/{id}/process", post(process_receipt))
        .method_not_allowed_fallback(not_found)
}

async fn list_receipts() -> AppResult<Response> {
    Err(not_implemented("Get receipts"))
}

async fn create_receipt() -> AppResult<Response> {
    Err(not_implemented("Create receipt"))
}

async fn upload_receipt() -> AppResult<Response> {
    Err(not_implemented("Receipt upload"))
}

async fn get_receipt() -> AppResult<Response> {
    Err(not_implemented("Get receipt"))
}

async fn update_receipt() -> AppResult<Response> {
    Err(not_implemented("Update receipt"))
}

async fn delete_receipt() -> AppResult<Response> {
    Err(not_implemented("Delete receipt"))
}

// Queues OCR once implemented
async fn process_receipt() -> AppResult<Response> {
    Err(not_implemented("Process receipt"))
}
