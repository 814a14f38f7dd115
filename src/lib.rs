//! # Receipt Tracker Backend Library
//!
//! Core library of the receipt & warranty tracker: an HTTP API for receipts,
//! products, warranties and notifications, plus the background job queues
//! that process receipts and send reminders.
//!
//! ## Architecture
//!
//! - **Axum** for routing and middleware
//! - **Tokio** as the async runtime
//! - **Redis** as the job queue store
//! - **SQLx** (Postgres) for the database pool
//!
//! ## Core Components
//!
//! - [`config`]: settings from environment variables, `.env` and embedded defaults
//! - [`logging`]: stdout and file log sinks, panic reporting
//! - [`error`]: the HTTP error type and its JSON envelope
//! - [`server`]: router assembly, graceful shutdown
//! - [`middleware`]: rate limiting, security headers, access log, body limit
//! - [`routes`]: endpoint handlers
//! - [`jobs`]: queues, workers, retry policy
//! - [`models`]: wire types shared with the front-end

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod signal;
pub mod state;

#[cfg(test)]
mod tests;
