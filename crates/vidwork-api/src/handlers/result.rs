//! `GET /result/:uploadId` (§6): download the finished report.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use vidwork_models::{JobState, UploadId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub async fn result(State(state): State<AppState>, Path(upload_id): Path<String>) -> ApiResult<Response> {
    let upload_id = UploadId::new(upload_id);
    let job = state
        .status
        .get(&upload_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no job for upload id {}", upload_id.as_str())))?;

    let result_key = match job.state {
        JobState::Completed { result_key } => result_key,
        _ => return Err(ApiError::not_found("report is not ready yet")),
    };

    let bytes = state.storage.download_bytes(&result_key).await?;
    let file_name = format!("{}.xlsx", upload_id.as_str());

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
