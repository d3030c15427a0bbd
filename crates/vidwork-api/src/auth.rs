//! Worker-secret authentication (§6: `Bearer worker-secret`).
//!
//! Every endpoint except `GET /health` requires `Authorization: Bearer
//! <WORKER_SECRET>`. There is no per-user session here — the caller is a
//! trusted platform component, not an end user, so a single shared secret
//! is the whole auth model.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn require_worker_secret(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(t) if !state.config.worker_secret.is_empty() && t == state.config.worker_secret => {
            Ok(next.run(request).await)
        }
        _ => Err(ApiError::unauthorized("missing or invalid worker secret")),
    }
}
