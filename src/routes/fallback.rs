use axum::extract::OriginalUri;

use crate::error::AppError;

/// Unknown paths, and known paths with an unsupported method.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path());
    AppError::RouteNotFound(target.to_string())
}
