use axum::{response::Response, routing::get, Router};

use super::fallback::not_found;
use super::not_implemented;
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/search", get(search_products))
        .route("/{id}", get(get_product).put(update_product).delete(delete_product))
        .method_not_allowed_fallback(not_found)
}

async fn list_products() -> AppResult<Response> {
    Err(not_implemented("Get products"))
}

async fn create_product() -> AppResult<Response> {
    Err(not_implemented("Create product"))
}

async fn search_products() -> AppResult<Response> {
    Err(not_implemented("Product search"))
}

async fn get_product() -> AppResult<Response> {
    Err(not_implemented("Get product"))
}

async fn update_product() -> AppResult<Response> {
    Err(not_implemented("Update product"))
}

async fn delete_product() -> AppResult<Response> {
    Err(not_implemented("Delete product"))
}
