//! Shutdown Coordinator (component C10, §4.10).
//!
//! Registers signal handlers once at process startup. The first terminate,
//! interrupt, or bus-error signal flips a shared flag, flushes the current
//! job's checkpoint, moves its status row to `error`/`SERVER_SHUTDOWN`, and
//! gives the process a short grace window to finish that write before
//! exiting. Any signal received after the flag is already set is a no-op —
//! a second Ctrl-C doesn't race the first shutdown's cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vidwork_docstore::{CheckpointStore, StatusStore};
use vidwork_models::{Checkpoint, JobState, UploadId};

use crate::config::WorkerConfig;

/// Message attached to the job's terminal error state on interruption
/// (§4.10, bit-exact with the design's user-facing copy).
pub const INTERRUPTED_MESSAGE: &str = "Processing was interrupted. Please try uploading again.";

/// The currently in-flight job, if any, so a signal handler knows what to
/// flush. Swapped in/out by the caller around each job's `process` call.
#[derive(Clone)]
pub struct InFlightJob {
    pub upload_id: UploadId,
    pub checkpoint: Arc<tokio::sync::Mutex<Checkpoint>>,
}

/// Coordinates a clean shutdown across however many signals the platform
/// delivers for "stop now".
pub struct ShutdownCoordinator {
    shutting_down: Arc<AtomicBool>,
    cancel: CancellationToken,
    status: StatusStore,
    checkpoints: CheckpointStore,
    grace: std::time::Duration,
}

impl ShutdownCoordinator {
    pub fn new(status: StatusStore, checkpoints: CheckpointStore, config: &WorkerConfig) -> Self {
        Self {
            shutting_down: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            status,
            checkpoints,
            grace: config.shutdown_grace,
        }
    }

    /// The cancellation token every orchestrator call should be handed, so
    /// a shutdown request unwinds every in-flight ffmpeg/HTTP call.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Register OS signal handlers and return once the first one fires.
    /// Intended to be raced against the server's main serve future via
    /// `tokio::select!`.
    #[cfg(unix)]
    pub async fn wait_for_signal(&self) {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut interrupt = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
        let mut bus_error = signal(SignalKind::bus()).expect("failed to register SIGBUS handler");

        let signal_name = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
            _ = bus_error.recv() => "SIGBUS",
        };
        self.begin_shutdown(signal_name);
    }

    #[cfg(not(unix))]
    pub async fn wait_for_signal(&self) {
        let _ = tokio::signal::ctrl_c().await;
        self.begin_shutdown("CTRL_C");
    }

    /// Mark shutdown in progress (idempotent) and cancel every outstanding
    /// operation. Safe to call more than once; only the first call has any
    /// effect.
    fn begin_shutdown(&self, signal_name: &str) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            warn!(signal = signal_name, "duplicate shutdown signal ignored");
            return;
        }
        info!(signal = signal_name, "shutdown signal received, cancelling in-flight work");
        self.cancel.cancel();
    }

    /// Flush the in-flight job's checkpoint and move its status row to the
    /// terminal `SERVER_SHUTDOWN` error, then wait out the grace window.
    /// Called with whatever job was active when the signal arrived, or
    /// `None` if the worker was idle.
    pub async fn flush_and_exit(&self, in_flight: Option<InFlightJob>, signal_name: &str) -> ! {
        if let Some(job) = in_flight {
            let mut checkpoint = job.checkpoint.lock().await;
            checkpoint.retry_count += 1;
            if let Err(e) = self.checkpoints.save(&mut checkpoint).await {
                warn!(error = %e, "failed to flush checkpoint during shutdown");
            }

            let interrupted_at = Utc::now().to_rfc3339();
            let message = format!("{INTERRUPTED_MESSAGE} (signal={signal_name}, interrupted_at={interrupted_at})");
            if let Err(e) = self
                .status
                .fail(&job.upload_id, "SERVER_SHUTDOWN".to_string(), message)
                .await
            {
                warn!(error = %e, "failed to mark job as interrupted during shutdown");
            }
        }

        tokio::time::sleep(self.grace).await;
        std::process::exit(0);
    }

    /// Route an unrecoverable runtime fault through the same interrupted-job
    /// cleanup path, exiting 1 instead of 0 (§4.10).
    pub async fn flush_and_exit_on_fault(&self, in_flight: Option<InFlightJob>, fault: &str) -> ! {
        warn!(fault, "uncaught fault, routing through shutdown cleanup");
        if let Some(job) = in_flight {
            let mut checkpoint = job.checkpoint.lock().await;
            checkpoint.retry_count += 1;
            let _ = self.checkpoints.save(&mut checkpoint).await;
            let _ = self
                .status
                .fail(&job.upload_id, "UNCAUGHT_EXCEPTION".to_string(), INTERRUPTED_MESSAGE.to_string())
                .await;
        }
        tokio::time::sleep(self.grace).await;
        std::process::exit(1);
    }
}

/// True while the current status row would reject moving a job past
/// `Processing` — used by the HTTP layer to refuse new `/process` submissions
/// once a shutdown is underway rather than accept work it cannot finish.
pub fn refuses_new_work(state: &JobState) -> bool {
    matches!(state, JobState::Error { error_code, .. } if error_code == "SERVER_SHUTDOWN")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_new_work_only_flags_the_shutdown_error_code() {
        assert!(refuses_new_work(&JobState::Error {
            error_code: "SERVER_SHUTDOWN".to_string(),
            message: "x".to_string(),
        }));
        assert!(!refuses_new_work(&JobState::Error {
            error_code: "INTERNAL".to_string(),
            message: "x".to_string(),
        }));
        assert!(!refuses_new_work(&JobState::Pending));
    }
}
