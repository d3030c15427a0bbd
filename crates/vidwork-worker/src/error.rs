//! Orchestrator error types (§7).

use thiserror::Error;
use vidwork_models::ErrorKind;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient external failure: {0}")]
    TransientExternal(String),

    #[error("permanent external failure: {0}")]
    PermanentExternal(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("cancelled")]
    Cancelled,

    #[error("resume budget exhausted after {0} attempts")]
    ResumeBudgetExhausted(u32),

    #[error("server shutdown")]
    ServerShutdown,

    #[error("storage error: {0}")]
    Storage(#[from] vidwork_storage::StorageError),

    #[error("document store error: {0}")]
    Docstore(#[from] vidwork_docstore::FirestoreError),

    #[error("media error: {0}")]
    Media(#[from] vidwork_media::MediaError),

    #[error("OCR/ASR provider error: {0}")]
    Provider(#[from] vidwork_ocr::OcrError),

    #[error("progress tracker error: {0}")]
    Progress(#[from] vidwork_progress::ProgressError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Map onto the cross-cutting error vocabulary (§7) that the
    /// orchestrator uses for retry/fail-stage/fail-job decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            WorkerError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            WorkerError::NotFound(_) => ErrorKind::NotFound,
            WorkerError::Timeout(_) => ErrorKind::Timeout,
            WorkerError::RateLimited(_) => ErrorKind::RateLimited,
            WorkerError::TransientExternal(_) => ErrorKind::TransientExternal,
            WorkerError::PermanentExternal(_) => ErrorKind::PermanentExternal,
            WorkerError::Internal(_) => ErrorKind::Internal,
            WorkerError::Cancelled => ErrorKind::Cancelled,
            WorkerError::ResumeBudgetExhausted(_) => ErrorKind::ResumeBudgetExhausted,
            WorkerError::ServerShutdown => ErrorKind::ServerShutdown,
            WorkerError::Storage(e) if e.is_retryable() => ErrorKind::TransientExternal,
            WorkerError::Storage(_) => ErrorKind::PermanentExternal,
            WorkerError::Docstore(_) => ErrorKind::TransientExternal,
            WorkerError::Media(_) => ErrorKind::TransientExternal,
            WorkerError::Provider(e) if e.is_retryable() => ErrorKind::TransientExternal,
            WorkerError::Provider(_) => ErrorKind::PermanentExternal,
            WorkerError::Progress(_) => ErrorKind::InvalidArgument,
            WorkerError::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
