//! Tests driving the crate through its public surface.
//!
//! - **config_tests**: variable coercion, defaults and every validation failure
//! - **error_tests**: error envelopes and status codes
//! - **health_api_tests**: `/health`, `/readyz` and `/metrics`
//! - **api_tests**: placeholder endpoints, fallback, middleware stack
//! - **server_tests**: graceful shutdown and drain timeout
//! - **worker_tests**: workers on the in-memory queue store
//! - **redis_store_tests**: the Redis queue store, when `REDIS_TEST_URL` is set

pub mod redis_store_tests;
pub mod server_tests;
pub mod worker_tests;

use axum::{body::Body, http::Response};
use http_body_util::BodyExt;

use crate::config::{self, AppConfig};
use crate::state::AppState;

pub(crate) const TEST_JWT_SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

/// Minimal valid variable set, overridden by `overrides`.
pub(crate) fn env_with(overrides: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = vec![
        ("NODE_ENV".into(), "test".into()),
        ("DATABASE_URL".into(), "postgres://localhost:1/receipt_tracker_test".into()),
        ("JWT_SECRET".into(), TEST_JWT_SECRET.into()),
    ];
    for (k, v) in overrides {
        vars.retain(|(existing, _)| existing != k);
        vars.push((k.to_string(), v.to_string()));
    }
    vars
}

pub(crate) fn test_config() -> AppConfig {
    config::load_from(env_with(&[])).unwrap()
}

/// State over a pool that never connects unless a test asks it to.
pub(crate) fn test_state(cfg: AppConfig) -> AppState {
    let pool = crate::db::connect_lazy(&cfg.database).unwrap();
    AppState::new(cfg, pool)
}

pub(crate) async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
