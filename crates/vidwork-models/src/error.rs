//! Cross-cutting error classification (§7 of the design).
//!
//! Every component crate defines its own `thiserror` enum for its own
//! failure modes, but each one can be mapped onto one of these kinds so the
//! orchestrator has a single vocabulary for retry/fail-stage/fail-job
//! decisions and the HTTP layer has a single vocabulary for status codes.

use serde::{Deserialize, Serialize};

/// One of the eleven error kinds named in the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    PermissionDenied,
    NotFound,
    Timeout,
    RateLimited,
    TransientExternal,
    PermanentExternal,
    Internal,
    Cancelled,
    ResumeBudgetExhausted,
    ServerShutdown,
}

impl ErrorKind {
    /// Never retried, regardless of the stage's retry budget.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::TransientExternal
        )
    }

    /// HTTP status the API layer should map this onto.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::Timeout
            | ErrorKind::TransientExternal
            | ErrorKind::PermanentExternal
            | ErrorKind::Internal
            | ErrorKind::Cancelled
            | ErrorKind::ResumeBudgetExhausted
            | ErrorKind::ServerShutdown => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::TransientExternal => "TRANSIENT_EXTERNAL",
            ErrorKind::PermanentExternal => "PERMANENT_EXTERNAL",
            ErrorKind::Internal => "INTERNAL",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::ResumeBudgetExhausted => "RESUME_BUDGET_EXHAUSTED",
            ErrorKind::ServerShutdown => "SERVER_SHUTDOWN",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
