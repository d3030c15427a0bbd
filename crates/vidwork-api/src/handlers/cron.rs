//! `POST /cron/cleanup-checkpoints` (§6): sweep expired checkpoints.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupResponse {
    deleted_count: u32,
}

pub async fn cleanup_checkpoints(State(state): State<AppState>) -> ApiResult<Json<CleanupResponse>> {
    let deleted_count = state.checkpoints.sweep().await?;
    metrics::record_checkpoints_swept(deleted_count);
    Ok(Json(CleanupResponse { deleted_count }))
}
