//! OCR/ASR provider pool, per-provider rate limiting, batching and
//! failover, and OCR post-processing (components C1, C7 dispatch, C8).

pub mod asr;
pub mod engine;
pub mod error;
pub mod postprocess;
pub mod providers;
pub mod ratelimit;

pub use asr::{transcribe_with_failover, AsrProvider, AsrProviderConfig, AsrProviderPool};
pub use engine::{
    partition_into_batches, process_batch, BatchOutcome, DEFAULT_BATCH_SIZE,
    DEFAULT_CONCURRENCY_PER_PROVIDER,
};
pub use error::{OcrError, OcrResult};
pub use postprocess::{postprocess_ocr, SceneText, MIN_MEANINGFUL_RUN_SECS, MIN_SCENES_FOR_OVERLAY_FILTER};
pub use providers::{OcrProvider, ProviderConfig, ProviderPool, DEFAULT_COOLDOWN};
pub use ratelimit::{Cancelled, RateLimiter};
