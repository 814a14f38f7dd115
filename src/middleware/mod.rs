//! HTTP middleware: client identification, rate limiting, security headers,
//! access logging, body size checks and error detail exposure.

pub mod access_log;
pub mod body_limit;
pub mod error_details;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;

pub use rate_limit::RateLimiter;
