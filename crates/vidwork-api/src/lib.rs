//! Axum HTTP API server for the video analysis worker (§6).
//!
//! This crate provides:
//! - The five-endpoint HTTP surface: submit, status, result, health, cron
//! - Worker-secret bearer authentication
//! - Security headers and CORS
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod providers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
