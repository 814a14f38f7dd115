//! One log line per request, in the morgan format chosen by `LOG_FORMAT`.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Version},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use super::ip::{extract_ip_from_headers, MaybeRemoteAddr};
use crate::config::AccessLogFormat;
use crate::state::AppState;

pub const ACCESS_TARGET: &str = "access";

/// Everything a format can print about one request.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub remote_addr: IpAddr,
    pub method: String,
    pub url: String,
    pub http_version: &'static str,
    pub status: u16,
    pub content_length: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub response_time: Duration,
    pub at: DateTime<Utc>,
}

fn version_str(v: Version) -> &'static str {
    match v {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Render `record`; absent values print as `-`.
pub fn render(format: AccessLogFormat, r: &AccessRecord) -> String {
    let dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let length = dash(&r.content_length);
    let millis = format!("{:.3}", r.response_time.as_secs_f64() * 1000.0);
    match format {
        AccessLogFormat::Combined => format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {} \"{}\" \"{}\"",
            r.remote_addr,
            r.at.format("%d/%b/%Y:%H:%M:%S %z"),
            r.method,
            r.url,
            r.http_version,
            r.status,
            length,
            dash(&r.referrer),
            dash(&r.user_agent)
        ),
        AccessLogFormat::Common => format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {}",
            r.remote_addr,
            r.at.format("%d/%b/%Y:%H:%M:%S %z"),
            r.method,
            r.url,
            r.http_version,
            r.status,
            length
        ),
        AccessLogFormat::Short => format!(
            "{} - {} {} HTTP/{} {} {} - {} ms",
            r.remote_addr, r.method, r.url, r.http_version, r.status, length, millis
        ),
        AccessLogFormat::Tiny => format!("{} {} {} {} - {} ms", r.method, r.url, r.status, length, millis),
        AccessLogFormat::Dev => format!("{} {} {} {} ms - {}", r.method, r.url, r.status, millis, length),
    }
}

pub async fn access_log_middleware(
    State(state): State<AppState>,
    MaybeRemoteAddr(remote): MaybeRemoteAddr,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let at = Utc::now();
    let remote_addr = extract_ip_from_headers(req.headers(), remote.map(|a| a.ip()));
    let method = req.method().to_string();
    let url = req.uri().path_and_query().map(|pq| pq.to_string()).unwrap_or_else(|| "/".to_string());
    let http_version = version_str(req.version());
    let referrer = header_string(req.headers(), header::REFERER);
    let user_agent = header_string(req.headers(), header::USER_AGENT);

    let res = next.run(req).await;

    state.metrics.record_response(res.status());
    let record = AccessRecord {
        remote_addr,
        method,
        url,
        http_version,
        status: res.status().as_u16(),
        content_length: header_string(res.headers(), header::CONTENT_LENGTH),
        referrer,
        user_agent,
        response_time: started.elapsed(),
        at,
    };
    tracing::info!(target: ACCESS_TARGET, "{}", render(state.config.logging.format, &record));
    res
}
