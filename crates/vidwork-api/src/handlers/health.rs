//! Health check handler (§6: `GET /health`, no auth).

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub revision: String,
    pub build_time: String,
    pub commit: String,
    pub timestamp: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        revision: state.config.revision.clone(),
        build_time: state.config.build_time.clone(),
        commit: state.config.commit.clone(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
