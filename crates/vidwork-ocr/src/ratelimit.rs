//! Rate limiter (component C1, §4.1).
//!
//! One instance per provider, parameterized by `requestsPerMinute`. A single
//! mutex guards the timestamp of the last admitted request: every
//! `acquire()` computes how much of `min_interval` is still outstanding
//! since that timestamp, sleeps the residual if any, then records itself as
//! the new last-admitted request before releasing the lock. Two concurrent
//! callers are serialized onto the same cadence rather than both measuring
//! against a stale timestamp and under-sleeping.

use std::future::Future;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const DEFAULT_MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 200;
const MAX_BACKOFF_MS: u64 = 10_000;

/// Paces calls to a single external provider to at most one admitted call
/// per `60s / requestsPerMinute`.
pub struct RateLimiter {
    min_interval: Duration,
    last_admitted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_admitted: Mutex::new(None),
        }
    }

    pub fn from_requests_per_minute(rpm: u32) -> Self {
        let rpm = rpm.max(1);
        Self::new(Duration::from_secs_f64(60.0 / rpm as f64))
    }

    /// Block until it is this caller's turn, then record the admission.
    /// Returns early without admitting if `cancel` fires during the sleep.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let mut last = self.last_admitted.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let residual = self.min_interval - elapsed;
                tokio::select! {
                    _ = tokio::time::sleep(residual) => {}
                    _ = cancel.cancelled() => return Err(Cancelled),
                }
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }

    /// Run `op` through this limiter's pacing, retrying up to
    /// `max_retries` times with exponential backoff and jitter when
    /// `retryable` says the error qualifies. Errors `retryable` rejects
    /// propagate immediately without consuming a retry.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        max_retries: Option<u32>,
        retryable: impl Fn(&E) -> bool,
        op: F,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + From<Cancelled>,
    {
        let max_retries = max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let mut last_err = None;

        for attempt in 0..=max_retries {
            if let Err(cancelled) = self.acquire(cancel).await {
                return Err(E::from(cancelled));
            }

            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max_retries && retryable(&e) => {
                    let delay = backoff_with_jitter(attempt);
                    warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "retrying provider call: {}", e);
                    last_err = Some(e);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.expect("loop always assigns last_err before exiting early, or returns above"))
    }
}

#[derive(Debug)]
pub struct Cancelled;

fn backoff_with_jitter(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF_MS.saturating_mul(2u64.pow(attempt)).min(MAX_BACKOFF_MS);
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let jitter_factor = (nanos % 1000) as f64 / 1000.0;
    Duration::from_millis(((exp as f64) * jitter_factor).max(BASE_BACKOFF_MS as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_acquire_never_waits() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        limiter.acquire(&cancel).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_acquire_waits_out_the_residual() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();
        let start = Instant::now();
        limiter.acquire(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_the_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();
        cancel.cancel();
        let start = Instant::now();
        let result = limiter.acquire(&cancel).await;
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn rpm_of_60_yields_one_second_interval() {
        let limiter = RateLimiter::from_requests_per_minute(60);
        assert_eq!(limiter.min_interval, Duration::from_secs(1));
    }

    #[derive(Debug)]
    struct TestErr(&'static str);

    impl std::fmt::Display for TestErr {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl From<Cancelled> for TestErr {
        fn from(_: Cancelled) -> Self {
            TestErr("cancelled")
        }
    }

    #[tokio::test]
    async fn non_retryable_errors_propagate_immediately() {
        let limiter = RateLimiter::new(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), TestErr> = limiter
            .execute_with_retry(&cancel, Some(3), |_| false, || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(TestErr("permanent"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_during_pacing_propagates_as_cancelled_not_a_call() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();
        cancel.cancel();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), TestErr> = limiter
            .execute_with_retry(&cancel, Some(3), |_| true, || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(TestErr("transient"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
