use serde::{de::DeserializeOwned, Serialize};
use web_sys::Storage;

use crate::types::ApiErrorBody;

pub const BASE: &str = "/api"; // same-origin, proxied to the API server

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

fn url(path: &str) -> String { format!("{}{}", BASE, path) }

fn storage() -> Option<Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

pub fn get_token(key: &str) -> Option<String> {
    storage().and_then(|s| s.get_item(key).ok().flatten()).filter(|t| !t.is_empty())
}

pub fn set_token(key: &str, value: &str) {
    if let Some(s) = storage() { let _ = s.set_item(key, value); }
}

pub fn clear_tokens() {
    if let Some(s) = storage() {
        let _ = s.remove_item(ACCESS_TOKEN_KEY);
        let _ = s.remove_item(REFRESH_TOKEN_KEY);
    }
}

pub fn is_authenticated() -> bool { get_token(ACCESS_TOKEN_KEY).is_some() }

fn map_net(e: reqwasm::Error) -> String { format!("Network error: {}", e) }

fn with_auth(req: reqwasm::http::Request) -> reqwasm::http::Request {
    match get_token(ACCESS_TOKEN_KEY) {
        Some(token) => req.header("Authorization", &format!("Bearer {}", token)),
        None => req,
    }
}

async fn error_message(resp: reqwasm::http::Response) -> String {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => body.message,
        Err(_) if text.is_empty() => format!("HTTP error {}", status),
        Err(_) => text,
    }
}

pub async fn get_json<T: DeserializeOwned>(path: &str) -> Result<T, String> {
    let resp = with_auth(reqwasm::http::Request::get(&url(path))).send().await.map_err(map_net)?;
    if !resp.ok() { return Err(error_message(resp).await); }
    resp.json().await.map_err(map_net)
}

async fn send_post<B: Serialize>(path: &str, body: &B) -> Result<reqwasm::http::Response, String> {
    let payload = serde_json::to_string(body).map_err(|e| e.to_string())?;
    let resp = with_auth(reqwasm::http::Request::post(&url(path)))
        .header("Content-Type", "application/json")
        .body(payload)
        .send()
        .await
        .map_err(map_net)?;
    if !resp.ok() { return Err(error_message(resp).await); }
    Ok(resp)
}

pub async fn post_json<B: Serialize, T: DeserializeOwned>(path: &str, body: &B) -> Result<T, String> {
    send_post(path, body).await?.json().await.map_err(map_net)
}

/// POST whose response body is ignored.
pub async fn post_unit<B: Serialize>(path: &str, body: &B) -> Result<(), String> {
    send_post(path, body).await.map(|_| ())
}
