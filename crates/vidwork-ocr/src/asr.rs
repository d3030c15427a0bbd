//! ASR provider dispatch (component C7, §4.7 step 2b).
//!
//! Mirrors [`crate::providers`]'s OCR provider pool: a discriminated set of
//! provider configs with a priority ordering, each wrapped in its own rate
//! limiter, rather than a vendor-specific class hierarchy.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vidwork_models::TranscriptionSegment;

use crate::error::{OcrError, OcrResult};
use crate::ratelimit::RateLimiter;

/// Default cooldown applied when an ASR provider reports rate-limit or
/// quota exhaustion, matching the OCR providers' policy (§4.8.1).
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Retries attempted against the same provider before failing it over to
/// the next one in the pool (§4.8.3 step 3, mirrored for ASR).
const SAME_PROVIDER_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct AsrProviderConfig {
    pub name: String,
    pub priority: u32,
    pub endpoint: String,
    pub api_key: String,
    pub requests_per_minute: u32,
    pub max_parallel: usize,
}

/// A configured, rate-limited ASR provider with live availability state.
pub struct AsrProvider {
    config: AsrProviderConfig,
    limiter: RateLimiter,
    http: reqwest::Client,
    unavailable_since: AtomicU64,
    enabled: AtomicBool,
}

impl AsrProvider {
    pub fn new(config: AsrProviderConfig, http: reqwest::Client) -> Self {
        let limiter = RateLimiter::from_requests_per_minute(config.requests_per_minute);
        Self {
            config,
            limiter,
            http,
            unavailable_since: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn priority(&self) -> u32 {
        self.config.priority
    }

    pub fn max_parallel(&self) -> usize {
        self.config.max_parallel.max(1)
    }

    pub fn is_available(&self) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return false;
        }
        let since = self.unavailable_since.load(Ordering::Relaxed);
        if since == 0 {
            return true;
        }
        epoch_from_u64(since).elapsed() >= DEFAULT_COOLDOWN
    }

    fn mark_unavailable(&self) {
        self.unavailable_since.store(now_as_u64(), Ordering::Relaxed);
        warn!(provider = %self.config.name, "ASR provider marked unavailable for cooldown");
    }

    /// Transcribe one speech-segment audio slice, relative to the slice's
    /// own start (the caller translates back to absolute time, §4.7 step
    /// 2c). Retries within this provider's own budget before the caller
    /// fails it over to the next provider (§4.8.3 step 3).
    pub async fn transcribe(
        &self,
        audio_bytes: &[u8],
        cancel: &CancellationToken,
    ) -> OcrResult<TranscriptionSegment> {
        if self.config.api_key.is_empty() {
            return Err(OcrError::NotConfigured(self.config.name.clone()));
        }

        self.limiter
            .execute_with_retry(
                cancel,
                Some(SAME_PROVIDER_RETRIES),
                OcrError::is_retryable_same_provider,
                || self.call_once(audio_bytes),
            )
            .await
    }

    async fn call_once(&self, audio_bytes: &[u8]) -> OcrResult<TranscriptionSegment> {
        let started = Instant::now();
        let audio_b64 = base64::engine::general_purpose::STANDARD.encode(audio_bytes);

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({ "audio_base64": audio_b64 }))
            .send()
            .await
            .map_err(|e| OcrError::RequestFailed(self.config.name.clone(), e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            self.mark_unavailable();
            return Err(OcrError::RateLimited(self.config.name.clone(), DEFAULT_COOLDOWN.as_millis() as u64));
        }
        if status.is_server_error() {
            return Err(OcrError::RequestFailed(
                self.config.name.clone(),
                format!("server error {status}"),
            ));
        }
        if !status.is_success() {
            return Err(OcrError::InvalidResponse(
                self.config.name.clone(),
                format!("unexpected status {status}"),
            ));
        }

        #[derive(serde::Deserialize)]
        struct Body {
            text: String,
            #[serde(default)]
            confidence: f64,
        }
        let body: Body = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(self.config.name.clone(), e.to_string()))?;

        debug!(provider = %self.config.name, elapsed_ms = started.elapsed().as_millis(), "ASR call completed");

        Ok(TranscriptionSegment {
            start: 0.0,
            duration: 0.0,
            text: body.text,
            confidence: body.confidence,
        })
    }
}

fn now_as_u64() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn epoch_from_u64(secs: u64) -> Instant {
    let now_secs = now_as_u64();
    let elapsed_secs = now_secs.saturating_sub(secs);
    Instant::now() - Duration::from_secs(elapsed_secs)
}

/// Ordered pool of ASR providers, tried highest-priority-first.
pub struct AsrProviderPool {
    providers: Vec<Arc<AsrProvider>>,
}

impl AsrProviderPool {
    pub fn new(mut providers: Vec<Arc<AsrProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self { providers }
    }

    pub fn all(&self) -> &[Arc<AsrProvider>] {
        &self.providers
    }

    pub fn next_available(&self) -> Option<Arc<AsrProvider>> {
        self.providers.iter().find(|p| p.is_available()).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Transcribe one speech-segment slice against the pool, trying providers
/// in priority order on retryable failure (mirrors §4.8.3's failover loop,
/// applied to ASR instead of OCR). `segment_start`/`segment_duration` are
/// the slice's absolute position, stamped onto the returned segment since
/// the provider only sees the slice itself.
pub async fn transcribe_with_failover(
    pool: &AsrProviderPool,
    audio_bytes: &[u8],
    segment_start: f64,
    segment_duration: f64,
    cancel: &CancellationToken,
) -> Option<TranscriptionSegment> {
    if pool.is_empty() {
        return None;
    }

    loop {
        let provider = pool.next_available()?;
        match provider.transcribe(audio_bytes, cancel).await {
            Ok(mut segment) => {
                segment.start = segment_start;
                segment.duration = segment_duration;
                return Some(segment);
            }
            Err(e) if e.is_retryable() => continue,
            Err(e) => {
                warn!(provider = %provider.name(), error = %e, "non-retryable ASR failure, dropping segment");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, priority: u32) -> Arc<AsrProvider> {
        Arc::new(AsrProvider::new(
            AsrProviderConfig {
                name: name.to_string(),
                priority,
                endpoint: "http://localhost/asr".to_string(),
                api_key: "key".to_string(),
                requests_per_minute: 60,
                max_parallel: 3,
            },
            reqwest::Client::new(),
        ))
    }

    #[test]
    fn pool_orders_by_priority() {
        let pool = AsrProviderPool::new(vec![provider("b", 2), provider("a", 1)]);
        assert_eq!(pool.all()[0].name(), "a");
        assert_eq!(pool.all()[1].name(), "b");
    }

    #[test]
    fn next_available_skips_cooling_down_providers() {
        let a = provider("a", 1);
        a.mark_unavailable();
        let b = provider("b", 2);
        let pool = AsrProviderPool::new(vec![a, b]);
        assert_eq!(pool.next_available().unwrap().name(), "b");
    }

    #[tokio::test]
    async fn empty_pool_yields_no_transcription() {
        let pool = AsrProviderPool::new(vec![]);
        let cancel = CancellationToken::new();
        let result = transcribe_with_failover(&pool, &[], 0.0, 1.0, &cancel).await;
        assert!(result.is_none());
    }
}
