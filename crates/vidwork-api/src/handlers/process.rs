//! `POST /process` (§6): the only way a job enters the pipeline.
//!
//! The response body is written in two pieces: the `202` JSON acknowledgment
//! is flushed immediately, then the stream is held open — emitting nothing
//! further — until the orchestrator finishes the job. Platforms that tie an
//! instance's lifetime to an in-flight request (the reason this shape
//! exists at all) keep the process alive for exactly as long as the job
//! needs, without the caller blocking on the full multi-minute pipeline.

use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use validator::Validate;
use vidwork_models::{DetectionMode, JobInput, UploadId, UserId};
use vidwork_worker::InFlightJob;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[validate(length(min = 1))]
    pub upload_id: String,
    #[validate(length(min = 1))]
    pub r2_key: String,
    #[validate(length(min = 1))]
    pub file_name: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    pub data_consent: bool,
    #[serde(default)]
    pub detection_mode: Option<DetectionMode>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessAck {
    success: bool,
    upload_id: String,
    status: &'static str,
    detection_mode: DetectionMode,
}

/// The object-store key layout is `uploads/<userId>/<uploadId>/...`
/// (§6); every access must verify the embedded owner matches the caller.
fn owner_matches(r2_key: &str, user_id: &str) -> bool {
    r2_key
        .strip_prefix("uploads/")
        .and_then(|rest| rest.split('/').next())
        .is_some_and(|owner| owner == user_id)
}

pub async fn process(State(state): State<AppState>, Json(req): Json<ProcessRequest>) -> ApiResult<Response> {
    req.validate().map_err(|e| ApiError::Validation(e.to_string()))?;

    if state.shutdown.is_shutting_down() {
        return Err(ApiError::Internal("server is shutting down, not accepting new work".to_string()));
    }

    if !owner_matches(&req.r2_key, &req.user_id) {
        return Err(ApiError::forbidden("r2Key does not belong to userId"));
    }

    let upload_id = UploadId::new(req.upload_id.clone());
    let user_id = UserId::new(req.user_id.clone());
    let detection_mode = req.detection_mode.unwrap_or_default();
    let input = JobInput {
        storage_key: req.r2_key.clone(),
        file_name: req.file_name.clone(),
        detection_mode,
        data_consent: req.data_consent,
    };

    // Idempotent submission (§6): a second POST for an already-known
    // uploadId is rejected by the status store's AlreadyExists check.
    state.status.init(&upload_id, &user_id, input.clone()).await?;

    let ack = serde_json::to_vec(&ProcessAck {
        success: true,
        upload_id: upload_id.as_str().to_string(),
        status: "processing",
        detection_mode,
    })
    .expect("ProcessAck always serializes");

    let cancel = state.shutdown.cancellation_token();
    let started = Instant::now();

    // Seed the shutdown coordinator's in-flight registry with whatever the
    // orchestrator will itself load (or create) for this upload id. The
    // orchestrator's own periodic checkpoint saves (§4.4) are the real
    // resume mechanism; this copy only backs `flush_and_exit`'s best-effort
    // extra save on termination, so staleness here is bounded by the
    // checkpoint interval, not by the whole job's duration — that bound
    // only holds because `main.rs` snapshots `state.in_flight` from inside
    // the shutdown-signal future itself, before `axum::serve`'s graceful
    // shutdown starts waiting for this very request's body to finish.
    let seed_checkpoint = state
        .checkpoints
        .load(&upload_id)
        .await?
        .unwrap_or_else(|| vidwork_models::Checkpoint::new(upload_id.clone()));
    let checkpoint_handle = std::sync::Arc::new(tokio::sync::Mutex::new(seed_checkpoint));
    *state.in_flight.lock().await = Some(InFlightJob {
        upload_id: upload_id.clone(),
        checkpoint: checkpoint_handle,
    });

    let job_future = run_job(state.clone(), upload_id.clone(), user_id, input, cancel, started);

    let head = stream::once(async move { Ok::<_, std::convert::Infallible>(Bytes::from(ack)) });
    let tail = stream::once(async move {
        job_future.await;
        Ok::<_, std::convert::Infallible>(Bytes::new())
    });

    let body = Body::from_stream(head.chain(tail));
    Ok((StatusCode::ACCEPTED, [("content-type", "application/json")], body).into_response())
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    state: AppState,
    upload_id: UploadId,
    user_id: UserId,
    input: JobInput,
    cancel: CancellationToken,
    started: Instant,
) {
    metrics::record_job_started();
    let result = state
        .orchestrator
        .process(upload_id.clone(), user_id, input, cancel)
        .await;
    *state.in_flight.lock().await = None;
    metrics::record_job_finished(result.is_ok(), started.elapsed().as_secs_f64());

    // `Orchestrator::process` only moves the status row to `Completed`
    // itself; any error path is the caller's job to record (it also runs
    // when the shutdown coordinator intervenes via `cancel`, in which case
    // this loses the race against `flush_and_exit`'s own `fail` call and
    // is a harmless no-op — `fail` is reachable from any state).
    if let Err(e) = result {
        let error_code = format!("{:?}", e.kind());
        let _ = state.status.fail(&upload_id, error_code, e.to_string()).await;
    }
}
