//! OCR provider pool and failover (§4.8.1, §4.8.3).
//!
//! Providers are modeled as a capability set — `PerformOCR` plus a rate
//! limiter and an availability flag — rather than a class hierarchy, per
//! the redesign note in §9: a discriminated set of provider configs with a
//! priority ordering stands in for what would otherwise be per-vendor
//! subclasses.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vidwork_models::OcrResult as OcrModelResult;

use crate::error::{OcrError, OcrResult};
use crate::ratelimit::RateLimiter;

/// Default cooldown applied when a provider reports rate-limit or quota
/// exhaustion (§4.8.1).
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Retries attempted against the same provider before failing it over to
/// the next one in the pool (§4.8.3 step 3).
const SAME_PROVIDER_RETRIES: u32 = 2;

/// Static configuration for one OCR vendor, read from the environment.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    /// Lower priority value is tried first.
    pub priority: u32,
    pub endpoint: String,
    pub api_key: String,
    pub requests_per_minute: u32,
    pub max_parallel: usize,
}

/// A configured, rate-limited provider with live availability state.
pub struct OcrProvider {
    config: ProviderConfig,
    limiter: RateLimiter,
    http: reqwest::Client,
    unavailable_since: AtomicU64,
    enabled: AtomicBool,
}

impl OcrProvider {
    pub fn new(config: ProviderConfig, http: reqwest::Client) -> Self {
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

    /// Available if enabled and not within its cooldown window.
    pub fn is_available(&self) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return false;
        }
        let since = self.unavailable_since.load(Ordering::Relaxed);
        if since == 0 {
            return true;
        }
        let marked_at = epoch_from_u64(since);
        marked_at.elapsed() >= DEFAULT_COOLDOWN
    }

    fn mark_unavailable(&self) {
        self.unavailable_since.store(now_as_u64(), Ordering::Relaxed);
        warn!(provider = %self.config.name, "provider marked unavailable for cooldown");
    }

    /// Call the provider, retrying within its own budget on a transient
    /// failure before the caller fails it over to the next provider
    /// (§4.8.3 step 3). Every attempt, including retries, is paced by this
    /// provider's rate limiter.
    pub async fn perform_ocr(
        &self,
        image_bytes: &[u8],
        prompt: &str,
        cancel: &CancellationToken,
    ) -> OcrResult<OcrModelResult> {
        if self.config.api_key.is_empty() {
            return Err(OcrError::NotConfigured(self.config.name.clone()));
        }

        self.limiter
            .execute_with_retry(
                cancel,
                Some(SAME_PROVIDER_RETRIES),
                OcrError::is_retryable_same_provider,
                || self.call_once(image_bytes, prompt),
            )
            .await
    }

    async fn call_once(&self, image_bytes: &[u8], prompt: &str) -> OcrResult<OcrModelResult> {
        let started = Instant::now();
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image_bytes);

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "prompt": prompt,
                "image_base64": image_b64,
            }))
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
            confidence: f64,
        }
        let body: Body = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(self.config.name.clone(), e.to_string()))?;

        debug!(provider = %self.config.name, elapsed_ms = started.elapsed().as_millis(), "OCR call completed");

        Ok(OcrModelResult {
            text: body.text,
            confidence: body.confidence,
            provider: self.config.name.clone(),
            elapsed_ms: started.elapsed().as_millis() as u64,
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
    // `unavailable_since` stores a wall-clock epoch second; we only ever
    // compare elapsed-since against it relative to "now", so reconstructing
    // an Instant via a fixed offset is sufficient for the cooldown check.
    let now_secs = now_as_u64();
    let elapsed_secs = now_secs.saturating_sub(secs);
    Instant::now() - Duration::from_secs(elapsed_secs)
}

/// Ordered pool of providers, tried highest-priority-first (§4.8.3).
pub struct ProviderPool {
    providers: Vec<Arc<OcrProvider>>,
}

impl ProviderPool {
    pub fn new(mut providers: Vec<Arc<OcrProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self { providers }
    }

    /// Providers in priority order, regardless of current availability.
    pub fn all(&self) -> &[Arc<OcrProvider>] {
        &self.providers
    }

    /// The highest-priority provider that is currently available.
    pub fn next_available(&self) -> Option<Arc<OcrProvider>> {
        self.providers.iter().find(|p| p.is_available()).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, priority: u32) -> Arc<OcrProvider> {
        Arc::new(OcrProvider::new(
            ProviderConfig {
                name: name.to_string(),
                priority,
                endpoint: "http://localhost/ocr".to_string(),
                api_key: "key".to_string(),
                requests_per_minute: 60,
                max_parallel: 3,
            },
            reqwest::Client::new(),
        ))
    }

    #[test]
    fn pool_orders_by_priority() {
        let pool = ProviderPool::new(vec![provider("b", 2), provider("a", 1)]);
        assert_eq!(pool.all()[0].name(), "a");
        assert_eq!(pool.all()[1].name(), "b");
    }

    #[test]
    fn next_available_skips_cooling_down_providers() {
        let a = provider("a", 1);
        a.mark_unavailable();
        let b = provider("b", 2);
        let pool = ProviderPool::new(vec![a, b]);
        assert_eq!(pool.next_available().unwrap().name(), "b");
    }

    #[test]
    fn empty_pool_has_no_next_available() {
        let pool = ProviderPool::new(vec![]);
        assert!(pool.next_available().is_none());
    }
}
