use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::SecondsFormat;
use serde_json::json;

use crate::db;
use crate::state::AppState;

const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness check. Touches no dependencies, so it answers even when the database is down.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "environment": state.config.env.as_str(),
    }))
}

/// Readiness check: 200 once the database answers a ping within five seconds, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match db::ping(&state.db, READINESS_TIMEOUT).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!("Readiness check failed: {:#}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not ready", "reason": e.to_string() })))
        }
    }
}

/// JSON snapshot of the request counters.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}
