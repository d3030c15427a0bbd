//! `GET /status/:uploadId` (§6): the status row the caller polls.

use axum::extract::{Path, State};
use axum::Json;
use vidwork_models::{Job, UploadId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn status(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let upload_id = UploadId::new(upload_id);
    let job = state
        .status
        .get(&upload_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no job for upload id {}", upload_id.as_str())))?;

    Ok(Json(job))
}
