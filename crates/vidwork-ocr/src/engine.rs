//! OCR engine batching, parallelism, and failover (§4.8.2, §4.8.3).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use vidwork_models::OcrResult as OcrModelResult;

use crate::providers::ProviderPool;

/// Default batch size: scenes are partitioned into independent
/// checkpoint-granularity batches of this size (§4.8.2).
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default per-provider bounded concurrency within a batch (§4.8.2).
pub const DEFAULT_CONCURRENCY_PER_PROVIDER: usize = 3;

/// Result of running OCR over one batch of scenes.
pub struct BatchOutcome {
    pub results: HashMap<u32, OcrModelResult>,
    pub warnings: Vec<String>,
}

/// Split a scene index list into contiguous batches of `batch_size`.
pub fn partition_into_batches(scene_indices: &[u32], batch_size: usize) -> Vec<Vec<u32>> {
    scene_indices
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Run OCR over one batch of `(sceneNumber, framePath)` pairs against the
/// provider pool, following §4.8.3's acquire-call-retry-failover loop for
/// every scene, with bounded concurrency across the whole batch.
///
/// `on_scene_done` is invoked once per completed scene (success or
/// exhaustion) so the caller can register in-flight progress with the
/// shutdown coordinator and progress tracker (§4.8.4).
pub async fn process_batch(
    scenes: &[(u32, PathBuf)],
    pool: Arc<ProviderPool>,
    prompt: Arc<str>,
    concurrency_per_provider: usize,
    cancel: CancellationToken,
    on_scene_done: impl Fn(u32) + Send + Sync + 'static,
) -> BatchOutcome {
    let total_permits = pool
        .all()
        .iter()
        .map(|p| p.max_parallel())
        .sum::<usize>()
        .max(concurrency_per_provider)
        .max(1);
    let semaphore = Arc::new(Semaphore::new(total_permits));
    let on_scene_done = Arc::new(on_scene_done);

    let mut tasks = Vec::with_capacity(scenes.len());
    for (scene_number, frame_path) in scenes.iter().cloned() {
        let semaphore = semaphore.clone();
        let pool = pool.clone();
        let prompt = prompt.clone();
        let cancel = cancel.clone();
        let on_scene_done = on_scene_done.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            let outcome = process_scene(scene_number, &frame_path, &pool, &prompt, &cancel).await;
            on_scene_done(scene_number);
            (scene_number, outcome)
        }));
    }

    let mut results = HashMap::with_capacity(scenes.len());
    let mut warnings = Vec::new();
    for task in tasks {
        let (scene_number, (result, warning)) = task.await.expect("OCR scene task panicked");
        results.insert(scene_number, result);
        if let Some(w) = warning {
            warnings.push(w);
        }
    }

    BatchOutcome { results, warnings }
}

/// Run the §4.8.3 selection-and-failover loop for a single scene's image.
async fn process_scene(
    scene_number: u32,
    frame_path: &std::path::Path,
    pool: &ProviderPool,
    prompt: &str,
    cancel: &CancellationToken,
) -> (OcrModelResult, Option<String>) {
    if pool.is_empty() {
        return (
            OcrModelResult::empty("none"),
            Some("OCR providers unavailable".to_string()),
        );
    }

    let image_bytes = match tokio::fs::read(frame_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(scene_number, error = %e, "failed to read scene frame, recording empty OCR result");
            return (OcrModelResult::empty("none"), None);
        }
    };

    let mut last_provider = "none".to_string();
    loop {
        let Some(provider) = pool.next_available() else {
            return (
                OcrModelResult::empty(last_provider),
                Some("OCR providers unavailable".to_string()),
            );
        };
        last_provider = provider.name().to_string();

        match provider.perform_ocr(&image_bytes, prompt, cancel).await {
            Ok(result) => return (result, None),
            Err(e) if e.is_retryable() => {
                // `perform_ocr` already retried within this provider's own
                // budget (§4.8.3 step 3) and, on a 429, marked it
                // unavailable; reaching here means that budget is spent, so
                // rotate to the next provider instead of hammering this one.
                warn!(scene_number, provider = %last_provider, error = %e, "OCR call exhausted retries, trying next provider");
                continue;
            }
            Err(e) => {
                warn!(scene_number, provider = %last_provider, error = %e, "non-retryable OCR failure");
                return (OcrModelResult::empty(last_provider), None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_split_evenly_with_a_short_final_batch() {
        let indices: Vec<u32> = (0..250).collect();
        let batches = partition_into_batches(&indices, 100);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[2].len(), 50);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(partition_into_batches(&[], 100).is_empty());
    }
}
