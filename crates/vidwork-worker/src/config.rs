//! Orchestrator configuration (§4.9, §5, §6).

use std::time::Duration;

/// Tunables for the pipeline orchestrator. One worker process runs exactly
/// one job at a time (§5); everything here governs concurrency *within*
/// a stage, not across jobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Frames in flight during frame extraction (§4.9.4, default 4).
    pub frame_extraction_parallelism: usize,
    /// Scenes processed with bounded concurrency per OCR provider (§4.8.2).
    pub ocr_concurrency_per_provider: usize,
    /// Scene batch size for OCR checkpointing (§4.8.2, default 100).
    pub ocr_batch_size: usize,
    /// Persist the checkpoint after this many completed OCR scenes, in
    /// addition to at batch end (§4.4, `OCR_CHECKPOINT_INTERVAL`).
    pub ocr_checkpoint_interval: u32,
    /// Persist the checkpoint after this many completed audio chunks, in
    /// addition to at stage end (§4.7, `WHISPER_CHECKPOINT_INTERVAL`).
    pub transcription_checkpoint_interval: u32,
    /// Resume attempts before the job fails as `RESUME_BUDGET_EXHAUSTED`
    /// (§4.9.2, default 3).
    pub max_resume_retries: u32,
    /// Object-store ranged-download parallelism (§4.5).
    pub download_parallelism: usize,
    /// Whole-job wall clock budget before the orchestrator gives up.
    pub job_timeout: Duration,
    /// Grace window the shutdown coordinator gives outstanding persistence
    /// before exiting (§4.10, default ~3s).
    pub shutdown_grace: Duration,
    /// Root directory each job gets a private subdirectory under (§5).
    pub work_dir: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            frame_extraction_parallelism: 4,
            ocr_concurrency_per_provider: 3,
            ocr_batch_size: 100,
            ocr_checkpoint_interval: 10,
            transcription_checkpoint_interval: 10,
            max_resume_retries: 3,
            download_parallelism: 4,
            job_timeout: Duration::from_secs(3600),
            shutdown_grace: Duration::from_secs(3),
            work_dir: "/tmp/vidwork".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Read overrides from the environment; anything unset keeps the
    /// spec's default (§6: configuration is read at startup, missing
    /// non-critical keys only matter at first use).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_extraction_parallelism: env_usize(
                "WORKER_FRAME_PARALLELISM",
                defaults.frame_extraction_parallelism,
            ),
            ocr_concurrency_per_provider: env_usize(
                "WORKER_OCR_CONCURRENCY_PER_PROVIDER",
                defaults.ocr_concurrency_per_provider,
            ),
            ocr_batch_size: env_usize("WORKER_OCR_BATCH_SIZE", defaults.ocr_batch_size),
            ocr_checkpoint_interval: env_u32(
                "OCR_CHECKPOINT_INTERVAL",
                defaults.ocr_checkpoint_interval,
            ),
            transcription_checkpoint_interval: env_u32(
                "WHISPER_CHECKPOINT_INTERVAL",
                defaults.transcription_checkpoint_interval,
            ),
            max_resume_retries: env_u32("WORKER_MAX_RESUME_RETRIES", defaults.max_resume_retries),
            download_parallelism: env_usize(
                "WORKER_DOWNLOAD_PARALLELISM",
                defaults.download_parallelism,
            ),
            job_timeout: Duration::from_secs(env_u64(
                "WORKER_JOB_TIMEOUT_SECS",
                defaults.job_timeout.as_secs(),
            )),
            shutdown_grace: Duration::from_millis(env_u64(
                "WORKER_SHUTDOWN_GRACE_MS",
                defaults.shutdown_grace.as_millis() as u64,
            )),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let config = WorkerConfig::default();
        assert_eq!(config.frame_extraction_parallelism, 4);
        assert_eq!(config.ocr_batch_size, 100);
        assert_eq!(config.max_resume_retries, 3);
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
    }
}
