//! OCR/ASR provider error types.

use thiserror::Error;

use crate::ratelimit::Cancelled;

pub type OcrResult<T> = Result<T, OcrError>;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("provider {0} is not configured (missing API key)")]
    NotConfigured(String),

    #[error("provider {0} request failed: {1}")]
    RequestFailed(String, String),

    #[error("provider {0} rate limited, retry after {1}ms")]
    RateLimited(String, u64),

    #[error("provider {0} returned an invalid response: {1}")]
    InvalidResponse(String, String),

    #[error("all configured providers are exhausted for this frame")]
    AllProvidersExhausted,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled while waiting on a provider's rate limiter")]
    Cancelled,
}

impl From<Cancelled> for OcrError {
    fn from(_: Cancelled) -> Self {
        OcrError::Cancelled
    }
}

impl OcrError {
    /// Whether this failure should count against a provider's cooldown
    /// rather than being retried immediately on the same provider (§4.8).
    pub fn is_provider_level(&self) -> bool {
        matches!(
            self,
            OcrError::RequestFailed(..) | OcrError::RateLimited(..) | OcrError::InvalidResponse(..)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OcrError::RequestFailed(..) | OcrError::RateLimited(..) | OcrError::Network(_))
    }

    /// Whether this failure is worth retrying against the *same* provider
    /// before failing it over (§4.8.3 step 3). A 429 already moved the
    /// provider into cooldown, so retrying it again here would just spin;
    /// that case goes straight to failover via [`OcrError::is_retryable`].
    pub fn is_retryable_same_provider(&self) -> bool {
        matches!(self, OcrError::RequestFailed(..) | OcrError::Network(_))
    }
}
