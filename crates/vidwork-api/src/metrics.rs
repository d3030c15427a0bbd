//! Prometheus metrics for the API server and the pipeline it drives (§10).

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder. Returns a handle that can be
/// used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vidwork_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vidwork_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vidwork_http_requests_in_flight";

    pub const JOBS_STARTED_TOTAL: &str = "vidwork_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vidwork_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vidwork_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "vidwork_job_duration_seconds";

    pub const STAGE_DURATION_SECONDS: &str = "vidwork_stage_duration_seconds";
    pub const OCR_PROVIDER_FAILOVERS_TOTAL: &str = "vidwork_ocr_provider_failovers_total";
    pub const PROVIDER_RATE_LIMIT_WAIT_SECONDS: &str = "vidwork_provider_rate_limit_wait_seconds";
    pub const CHECKPOINTS_SWEPT_TOTAL: &str = "vidwork_checkpoints_swept_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a job entering `/process`.
pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

/// Record a job's terminal outcome and total wall time.
pub fn record_job_finished(succeeded: bool, duration_secs: f64) {
    if succeeded {
        counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    } else {
        counter!(names::JOBS_FAILED_TOTAL).increment(1);
    }
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

/// Record a pipeline stage's duration.
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an OCR/ASR provider failover (one provider exhausted, tried the next).
pub fn record_provider_failover(kind: &str, from_provider: &str) {
    let labels = [("kind", kind.to_string()), ("provider", from_provider.to_string())];
    counter!(names::OCR_PROVIDER_FAILOVERS_TOTAL, &labels).increment(1);
}

/// Record time spent waiting on a provider's rate limiter.
pub fn record_rate_limit_wait(provider: &str, wait_secs: f64) {
    let labels = [("provider", provider.to_string())];
    histogram!(names::PROVIDER_RATE_LIMIT_WAIT_SECONDS, &labels).record(wait_secs);
}

/// Record how many expired checkpoints a sweep deleted.
pub fn record_checkpoints_swept(count: u32) {
    counter!(names::CHECKPOINTS_SWEPT_TOTAL).increment(count as u64);
}

/// Sanitize a request path for use as a metric label: collapse the
/// caller-supplied `uploadId` segment so label cardinality stays bounded
/// regardless of how many distinct jobs run through this process.
fn sanitize_path(path: &str) -> String {
    let path = regex_lite::Regex::new(r"/status/[^/]+")
        .unwrap()
        .replace_all(path, "/status/:upload_id");
    let path = regex_lite::Regex::new(r"/result/[^/]+")
        .unwrap()
        .replace_all(&path, "/result/:upload_id");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();
    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_path_collapses_upload_ids() {
        assert_eq!(sanitize_path("/status/upload_1700000000_ab12cd"), "/status/:upload_id");
        assert_eq!(sanitize_path("/result/upload_1700000000_ab12cd"), "/result/:upload_id");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
