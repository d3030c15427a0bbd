//! API configuration (§6, §10).

use std::time::Duration;

/// API server configuration. Resolved once at process startup; every
/// handler reads the copy in `AppState` rather than touching the
/// environment directly (§6: configuration is read at startup).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    pub max_body_size: usize,
    pub environment: String,
    /// Bearer token every authenticated endpoint requires (§6, `WORKER_SECRET`).
    pub worker_secret: String,
    /// Object-store key prefix the uploaded report is written under, e.g.
    /// `results` in `results/<userId>/<uploadId>/report.xlsx`.
    pub result_bucket_prefix: String,
    pub revision: String,
    pub build_time: String,
    pub commit: String,
}

impl ApiConfig {
    /// Create config from environment variables. `WORKER_SECRET` is the
    /// only value the spec calls out as required at startup beyond the
    /// provider/object-store credentials the dependent crates read
    /// themselves; a missing secret only fails the first authenticated
    /// request, not process startup (§6).
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            worker_secret: std::env::var("WORKER_SECRET").unwrap_or_default(),
            result_bucket_prefix: std::env::var("RESULT_BUCKET_PREFIX")
                .unwrap_or_else(|_| "results".to_string()),
            revision: std::env::var("REVISION").unwrap_or_else(|_| "dev".to_string()),
            build_time: std::env::var("BUILD_TIME").unwrap_or_else(|_| "unknown".to_string()),
            commit: std::env::var("GIT_COMMIT").unwrap_or_else(|_| "unknown".to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
