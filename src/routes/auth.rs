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
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .method_not_allowed_fallback(not_found)
}

async fn register() -> AppResult<Response> {
    Err(not_implemented("Registration"))
}

async fn login() -> AppResult<Response> {
    Err(not_implemented("Login"))
}

async fn refresh() -> AppResult<Response> {
    Err(not_implemented("Token refresh"))
}

async fn logout() -> AppResult<Response> {
    Err(not_implemented("Logout"))
}

async fn me() -> AppResult<Response> {
    Err(not_implemented("Get current user"))
}

async fn forgot_password() -> AppResult<Response> {
    Err(not_implemented("Forgot password"))
}

async fn reset_password() -> AppResult<Response> {
    Err(not_implemented("Password reset"))
}
