//! API routes (§6).

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::auth::require_worker_secret;
use crate::handlers::{cleanup_checkpoints, health, process, result, status};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let authenticated_routes = Router::new()
        .route("/process", post(process))
        .route("/status/:upload_id", get(status))
        .route("/result/:upload_id", get(result))
        .route("/cron/cleanup-checkpoints", post(cleanup_checkpoints))
        .layer(middleware::from_fn_with_state(state.clone(), require_worker_secret));

    let health_routes = Router::new().route("/health", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(authenticated_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
