//! Client side of the `/api/auth` endpoints.

use serde_json::json;

use crate::api::{self, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::types::{AuthResponse, LoginCredentials, RefreshResponse, RegisterCredentials, User};

fn store(auth: &AuthResponse) {
    api::set_token(ACCESS_TOKEN_KEY, &auth.access_token);
    api::set_token(REFRESH_TOKEN_KEY, &auth.refresh_token);
}

pub async fn login(credentials: &LoginCredentials) -> Result<AuthResponse, String> {
    let auth: AuthResponse = api::post_json("/auth/login", credentials).await?;
    store(&auth);
    Ok(auth)
}

pub async fn register(credentials: &RegisterCredentials) -> Result<AuthResponse, String> {
    let auth: AuthResponse = api::post_json("/auth/register", credentials).await?;
    store(&auth);
    Ok(auth)
}

/// Tell the server, then forget the tokens whatever it answered.
pub async fn logout() {
    if let Some(refresh_token) = api::get_token(REFRESH_TOKEN_KEY) {
        let _ = api::post_unit("/auth/logout", &json!({ "refreshToken": refresh_token })).await;
    }
    api::clear_tokens();
}

pub async fn get_current_user() -> Result<User, String> {
    api::get_json("/auth/me").await
}

pub async fn refresh_token(refresh_token: &str) -> Result<RefreshResponse, String> {
    let resp: RefreshResponse = api::post_json("/auth/refresh", &json!({ "refreshToken": refresh_token })).await?;
    api::set_token(ACCESS_TOKEN_KEY, &resp.access_token);
    Ok(resp)
}

pub async fn forgot_password(email: &str) -> Result<(), String> {
    api::post_unit("/auth/forgot-password", &json!({ "email": email })).await
}

pub async fn reset_password(token: &str, password: &str) -> Result<(), String> {
    api::post_unit("/auth/reset-password", &json!({ "token": token, "password": password })).await
}
