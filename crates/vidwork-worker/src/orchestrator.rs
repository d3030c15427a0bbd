//! Pipeline Orchestrator (component C9, §4.9).
//!
//! Sequences the nine processing stages for one job, each with its own
//! progress band on the 0-100 scale the status row reports. One worker
//! process runs exactly one job at a time (§5): everything bounded here is
//! concurrency *within* a stage, never across jobs.
//!
//! The six-variant [`Stage`] that the status row and checkpoint persist is
//! coarser than the nine-row stage table: "probe metadata" rides the tail
//! of [`Stage::Downloading`] and "extract frames" rides the tail of
//! [`Stage::SceneDetection`], distinguished only by their progress band, not
//! by a dedicated `Stage` variant. `Stage` answers "which collection of
//! checkpoint fields is this", progress answers "how far within it".

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use vidwork_docstore::{CheckpointStore, StatusStore};
use vidwork_media::{
    command::{FfmpegCommand, FfmpegRunner},
    detect_scene_cuts, probe_video, SharedVad,
};
use vidwork_models::{
    generate_scenes, Checkpoint, DetectionMode, JobInput, JobState, Scene, Stage, UploadId, UserId,
};
use vidwork_ocr::{partition_into_batches, postprocess_ocr, process_batch, AsrProviderPool, ProviderPool, SceneText};
use vidwork_progress::ProgressTracker;
use vidwork_storage::{download_ranged, R2Client};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::report::build_report;
use crate::retry::{retry_async, RetryConfig, RetryResult};
use crate::transcription;

/// Progress bands, `(start, end)` inclusive-exclusive on the 0-100 scale,
/// for every row of the stage table (§4.9.1).
mod bands {
    pub const DOWNLOAD: (u8, u8) = (0, 10);
    pub const PROBE: (u8, u8) = (10, 12);
    pub const EXTRACT_AUDIO: (u8, u8) = (12, 20);
    pub const TRANSCRIBE: (u8, u8) = (20, 35);
    pub const SCENE_DETECT: (u8, u8) = (35, 50);
    pub const EXTRACT_FRAMES: (u8, u8) = (50, 65);
    pub const OCR: (u8, u8) = (65, 90);
    pub const POSTPROCESS: (u8, u8) = (90, 97);
    pub const UPLOAD: (u8, u8) = (97, 100);
}

fn scale_into_band(band: (u8, u8), pct: u8) -> u8 {
    let (start, end) = band;
    let width = (end - start) as u32;
    start + ((pct as u32 * width) / 100) as u8
}

/// External dependencies the orchestrator is handed at construction, so it
/// never reaches into the environment itself (§6: configuration is resolved
/// once, at process startup, by the caller).
pub struct OrchestratorDeps {
    pub storage: Arc<R2Client>,
    pub status: StatusStore,
    pub checkpoints: CheckpointStore,
    pub ocr_pool: Arc<ProviderPool>,
    pub asr_pool: Arc<AsrProviderPool>,
    pub vad: SharedVad,
    pub result_bucket_prefix: String,
}

pub struct Orchestrator {
    deps: OrchestratorDeps,
    config: WorkerConfig,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps, config: WorkerConfig) -> Self {
        Self { deps, config }
    }

    /// Run the full pipeline for one job, from a fresh or resumed
    /// checkpoint through to the uploaded report. Never returns `Ok` without
    /// having also moved the status row to `Completed`; any error path is
    /// the caller's cue to move it to `Error` (the shutdown coordinator and
    /// the HTTP handler both do this for different reasons).
    #[instrument(skip(self, input, cancel), fields(upload_id = %upload_id))]
    pub async fn process(
        &self,
        upload_id: UploadId,
        user_id: UserId,
        input: JobInput,
        cancel: CancellationToken,
    ) -> WorkerResult<String> {
        let logger = JobLogger::new(&upload_id, "pipeline");
        logger.log_start(&format!("processing {}", input.file_name));

        let job_dir = PathBuf::from(&self.config.work_dir).join(upload_id.as_str());
        tokio::fs::create_dir_all(&job_dir).await?;

        let mut checkpoint = self.load_or_create_checkpoint(&upload_id).await?;

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(Stage, u8, Option<String>)>();
        let status = self.deps.status.clone();
        let upload_for_emitter = upload_id.clone();
        let emitter_task = tokio::spawn(async move {
            while let Some((stage, progress, sub_task)) = progress_rx.recv().await {
                if let Err(e) = status
                    .update(
                        &upload_for_emitter,
                        JobState::Processing { stage, progress, sub_task },
                    )
                    .await
                {
                    warn!(error = %e, "failed to persist progress update");
                }
            }
        });

        let result = self
            .run_stages(&upload_id, &user_id, &input, &job_dir, &mut checkpoint, &progress_tx, &cancel)
            .await;

        drop(progress_tx);
        let _ = emitter_task.await;

        // Only the job's own local scratch directory is reclaimed here, and
        // only once the pipeline actually finished: on any error (including
        // a clean `Cancelled` shutdown) the checkpoint survives, and a local
        // directory still holding the downloaded source/audio is exactly
        // what lets the next attempt skip re-downloading them (§4.4).
        match &result {
            Ok(_) => {
                let _ = tokio::fs::remove_dir_all(&job_dir).await;
                self.deps.checkpoints.delete(&upload_id).await.ok();
                logger.log_completion("pipeline finished");
            }
            Err(e) => {
                logger.log_error(&e.to_string());
            }
        }
        result
    }

    async fn load_or_create_checkpoint(&self, upload_id: &UploadId) -> WorkerResult<Checkpoint> {
        match self.deps.checkpoints.load(upload_id).await? {
            Some(mut checkpoint) if !checkpoint.is_expired(chrono::Utc::now()) => {
                checkpoint.retry_count += 1;
                if checkpoint.retry_count > self.config.max_resume_retries {
                    return Err(WorkerError::ResumeBudgetExhausted(checkpoint.retry_count));
                }
                self.deps.checkpoints.save(&mut checkpoint).await?;
                info!(retry_count = checkpoint.retry_count, "resuming from checkpoint");
                Ok(checkpoint)
            }
            _ => Ok(Checkpoint::new(upload_id.clone())),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stages(
        &self,
        upload_id: &UploadId,
        user_id: &UserId,
        input: &JobInput,
        job_dir: &Path,
        checkpoint: &mut Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
        cancel: &CancellationToken,
    ) -> WorkerResult<String> {
        let video_path = self
            .stage_download(upload_id, user_id, input, job_dir, checkpoint, progress_tx, cancel)
            .await?;

        let video_info = self.stage_probe(&video_path, checkpoint, progress_tx).await?;

        let audio_path = self
            .stage_extract_audio(upload_id, user_id, &video_path, job_dir, checkpoint, progress_tx, cancel)
            .await?;

        let segments = self
            .stage_transcribe(&audio_path, video_info.duration, job_dir, checkpoint, progress_tx, cancel)
            .await?;
        checkpoint.advance_step(Stage::Transcription);
        self.deps.checkpoints.save(checkpoint).await?;

        let scenes = self
            .stage_scene_detect(&video_path, video_info.duration, checkpoint, progress_tx)
            .await?;

        let frames = self
            .stage_extract_frames(upload_id, &video_path, &scenes, job_dir, checkpoint, progress_tx, cancel)
            .await?;

        let ocr_results = self
            .stage_ocr(upload_id, &scenes, &frames, input, checkpoint, progress_tx, cancel)
            .await?;
        checkpoint.advance_step(Stage::Ocr);
        self.deps.checkpoints.save(checkpoint).await?;

        let report_key = self
            .stage_postprocess_and_upload(upload_id, input, &scenes, &ocr_results, &segments, checkpoint, progress_tx)
            .await?;

        Ok(report_key)
    }

    /// The local file backing the given intermediate object-store key,
    /// downloading it first if this process doesn't already have it on
    /// disk (§4.4: the checkpoint's intermediate fields are object-store
    /// keys, so resumption works even after a full process restart, not
    /// just a retry within the same `work_dir`).
    async fn materialize_intermediate(&self, key: &str, local_path: &Path) -> WorkerResult<()> {
        if local_path.exists() {
            return Ok(());
        }
        info!(key, "reusing intermediate from object store checkpoint");
        let bytes = self.deps.storage.download_bytes(key).await.map_err(WorkerError::from)?;
        tokio::fs::write(local_path, bytes).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn stage_download(
        &self,
        upload_id: &UploadId,
        user_id: &UserId,
        input: &JobInput,
        job_dir: &Path,
        checkpoint: &mut Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
        cancel: &CancellationToken,
    ) -> WorkerResult<PathBuf> {
        let video_path = job_dir.join("source");
        if let Some(key) = checkpoint.intermediate_video_path.clone() {
            self.materialize_intermediate(&key, &video_path).await?;
            return Ok(video_path);
        }

        let storage = self.deps.storage.clone();
        let key = input.storage_key.clone();
        let parallelism = self.config.download_parallelism;
        let retried = retry_async(&RetryConfig::new("download").with_max_retries(2), || {
            let storage = storage.clone();
            let key = key.clone();
            async move {
                download_ranged(&storage, &key, parallelism, vidwork_storage::DEFAULT_STALL_MS, None).await
            }
        })
        .await;
        let bytes = match retried {
            RetryResult::Success(bytes) => bytes,
            RetryResult::Failed { error, .. } => return Err(WorkerError::from(error)),
        };

        if cancel.is_cancelled() {
            return Err(WorkerError::Cancelled);
        }

        tokio::fs::write(&video_path, &bytes).await?;

        let ext = Path::new(&input.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let intermediate_key = vidwork_storage::source_video_key(user_id.as_str(), upload_id.as_str(), ext);
        self.deps
            .storage
            .upload_bytes(bytes, &intermediate_key, "application/octet-stream")
            .await
            .map_err(WorkerError::from)?;

        checkpoint.intermediate_video_path = Some(intermediate_key);
        checkpoint.advance_step(Stage::Downloading);
        self.deps.checkpoints.save(checkpoint).await?;

        let _ = progress_tx.send((Stage::Downloading, bands::DOWNLOAD.1, Some("Downloaded source video".into())));
        Ok(video_path)
    }

    async fn stage_probe(
        &self,
        video_path: &Path,
        checkpoint: &mut Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
    ) -> WorkerResult<vidwork_media::VideoInfo> {
        let info = if let Some(duration) = checkpoint.video_duration {
            // Re-probing is cheap and the file is on disk either way; still
            // re-run it so width/height/codec are available to the report
            // stage even after a resume.
            let mut info = probe_video(video_path).await?;
            info.duration = duration;
            info
        } else {
            probe_video(video_path).await?
        };

        checkpoint.video_duration = Some(info.duration);
        self.deps.checkpoints.save(checkpoint).await?;
        let _ = progress_tx.send((Stage::Downloading, bands::PROBE.1, Some("Probed source metadata".into())));
        Ok(info)
    }

    async fn stage_extract_audio(
        &self,
        upload_id: &UploadId,
        user_id: &UserId,
        video_path: &Path,
        job_dir: &Path,
        checkpoint: &mut Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
        cancel: &CancellationToken,
    ) -> WorkerResult<PathBuf> {
        let audio_path = job_dir.join("audio.wav");
        if let Some(key) = checkpoint.intermediate_audio_path.clone() {
            self.materialize_intermediate(&key, &audio_path).await?;
            return Ok(audio_path);
        }

        let cmd = FfmpegCommand::new(video_path, &audio_path)
            .audio_codec("pcm_s16le")
            .output_args(["-ar", "16000", "-ac", "1", "-vn"])
            .log_level("error");
        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let bridge = bridge_cancellation(cancel.clone(), cancel_tx);
        let runner = FfmpegRunner::new().with_cancel(cancel_rx).with_timeout(self.config.job_timeout.as_secs());
        let run = runner.run(&cmd).await;
        bridge.abort();
        run?;

        let audio_bytes = tokio::fs::read(&audio_path).await?;
        let intermediate_key = vidwork_storage::audio_key(user_id.as_str(), upload_id.as_str());
        self.deps
            .storage
            .upload_bytes(audio_bytes, &intermediate_key, "audio/wav")
            .await
            .map_err(WorkerError::from)?;

        checkpoint.intermediate_audio_path = Some(intermediate_key);
        checkpoint.advance_step(Stage::AudioExtraction);
        self.deps.checkpoints.save(checkpoint).await?;
        let _ = progress_tx.send((
            Stage::AudioExtraction,
            bands::EXTRACT_AUDIO.1,
            Some("Extracted audio track".into()),
        ));
        Ok(audio_path)
    }

    async fn stage_transcribe(
        &self,
        audio_path: &Path,
        duration: f64,
        job_dir: &Path,
        checkpoint: &mut Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
        cancel: &CancellationToken,
    ) -> WorkerResult<Vec<vidwork_models::TranscriptionSegment>> {
        let checkpoints = &self.deps.checkpoints;
        let interval = self.config.transcription_checkpoint_interval;
        let vad = self.deps.vad.clone();
        let asr_pool = self.deps.asr_pool.clone();
        let tx = progress_tx.clone();

        let segments = transcription::transcribe(
            audio_path,
            duration,
            job_dir,
            vad,
            &asr_pool,
            checkpoint,
            interval,
            |cp| {
                let pct = if cp.total_audio_chunks == 0 {
                    100
                } else {
                    ((cp.completed_audio_chunks.len() as u64 * 100) / cp.total_audio_chunks as u64) as u8
                };
                let _ = tx.send((
                    Stage::Transcription,
                    scale_into_band(bands::TRANSCRIBE, pct),
                    Some(format!(
                        "Transcribing audio chunk {}/{}",
                        cp.completed_audio_chunks.len(),
                        cp.total_audio_chunks
                    )),
                ));
            },
            cancel,
        )
        .await?;

        checkpoints.save(checkpoint).await?;
        Ok(segments)
    }

    async fn stage_scene_detect(
        &self,
        video_path: &Path,
        duration: f64,
        checkpoint: &mut Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
    ) -> WorkerResult<Vec<Scene>> {
        if !checkpoint.scene_cuts.is_empty() || checkpoint.total_scenes > 0 {
            return Ok(generate_scenes(&checkpoint.scene_cuts, duration));
        }

        let cuts = detect_scene_cuts(video_path).await?;
        let scenes = generate_scenes(&cuts, duration);

        checkpoint.scene_cuts = cuts;
        checkpoint.total_scenes = scenes.len() as u32;
        checkpoint.advance_step(Stage::SceneDetection);
        self.deps.checkpoints.save(checkpoint).await?;

        let _ = progress_tx.send((
            Stage::SceneDetection,
            scale_into_band(bands::SCENE_DETECT, 100),
            Some(format!("Detected {} scenes", scenes.len())),
        ));
        Ok(scenes)
    }

    /// Extract one representative frame per scene not already OCR'd, with
    /// `frame_extraction_parallelism` in flight at a time. A single scene's
    /// extraction failing never fails the job (§4.9.4): it is simply
    /// dropped from the map handed to the OCR stage, which will then treat
    /// it as missing and record an empty result with a warning.
    async fn stage_extract_frames(
        &self,
        upload_id: &UploadId,
        video_path: &Path,
        scenes: &[Scene],
        job_dir: &Path,
        checkpoint: &Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
        cancel: &CancellationToken,
    ) -> WorkerResult<HashMap<u32, PathBuf>> {
        let frame_dir = job_dir.join("frames");
        tokio::fs::create_dir_all(&frame_dir).await?;

        let pending: Vec<&Scene> = scenes
            .iter()
            .filter(|s| !checkpoint.completed_ocr_scenes.contains(&s.scene_number))
            .collect();
        if pending.is_empty() {
            return Ok(HashMap::new());
        }

        let tx = progress_tx.clone();
        let tracker = ProgressTracker::new(
            upload_id.as_str(),
            pending.len() as u64,
            "Extracting frame",
            Some(Arc::new(move |snapshot: &vidwork_progress::ProgressSnapshot| {
                let _ = tx.send((
                    Stage::SceneDetection,
                    scale_into_band(bands::EXTRACT_FRAMES, snapshot.percent()),
                    Some(format!(
                        "Extracting frame {}/{}",
                        snapshot.completed, snapshot.total_items
                    )),
                ));
            })),
            1000,
        )
        .map_err(|e| WorkerError::Internal(e.to_string()))?;

        let semaphore = Arc::new(Semaphore::new(self.config.frame_extraction_parallelism.max(1)));
        let mut tasks = Vec::with_capacity(pending.len());
        for scene in pending {
            let permit = semaphore.clone();
            let video_path = video_path.to_path_buf();
            let out_path = frame_dir.join(format!("scene_{:06}.jpg", scene.scene_number));
            let scene_number = scene.scene_number;
            let mid_time = scene.mid_time;
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let cmd = FfmpegCommand::new(&video_path, &out_path)
                    .seek(mid_time)
                    .single_frame()
                    .log_level("error");
                let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
                let bridge = bridge_cancellation(cancel.clone(), cancel_tx);
                let runner = FfmpegRunner::new().with_cancel(cancel_rx);
                let result = runner.run(&cmd).await;
                bridge.abort();
                (scene_number, result.map(|_| out_path))
            }));
        }

        let mut frames = HashMap::with_capacity(tasks.len());
        for task in tasks {
            let (scene_number, result) = task.await.map_err(|e| WorkerError::Internal(e.to_string()))?;
            match result {
                Ok(path) => {
                    frames.insert(scene_number, path);
                }
                Err(e) => {
                    warn!(scene = scene_number, error = %e, "frame extraction failed, scene will OCR empty");
                }
            }
            tracker.increment(Some(scene_number.to_string()));
        }
        Ok(frames)
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_ocr(
        &self,
        upload_id: &UploadId,
        scenes: &[Scene],
        frames: &HashMap<u32, PathBuf>,
        input: &JobInput,
        checkpoint: &mut Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
        cancel: &CancellationToken,
    ) -> WorkerResult<HashMap<u32, vidwork_models::OcrResult>> {
        let mut results: HashMap<u32, vidwork_models::OcrResult> = checkpoint
            .ocr_results
            .iter()
            .map(|(scene, text)| {
                (
                    *scene,
                    vidwork_models::OcrResult {
                        text: text.clone(),
                        confidence: 1.0,
                        provider: "checkpoint".to_string(),
                        elapsed_ms: 0,
                    },
                )
            })
            .collect();

        let pending_indices: Vec<u32> = scenes
            .iter()
            .map(|s| s.scene_number)
            .filter(|n| !checkpoint.completed_ocr_scenes.contains(n))
            .collect();

        if pending_indices.is_empty() {
            return Ok(results);
        }

        let prompt: Arc<str> = Arc::from(prompt_for_mode(input.detection_mode));
        let batches = partition_into_batches(&pending_indices, self.config.ocr_batch_size);

        let tx = progress_tx.clone();
        let tracker = Arc::new(
            ProgressTracker::new(
                upload_id.as_str(),
                pending_indices.len() as u64,
                "Processing scene",
                Some(Arc::new(move |snapshot: &vidwork_progress::ProgressSnapshot| {
                    let _ = tx.send((
                        Stage::Ocr,
                        scale_into_band(bands::OCR, snapshot.percent()),
                        Some(format!(
                            "{} {}/{} ({}%)",
                            snapshot.phase_label,
                            snapshot.completed,
                            snapshot.total_items,
                            snapshot.percent()
                        )),
                    ));
                })),
                1000,
            )
            .map_err(|e| WorkerError::Internal(e.to_string()))?,
        );

        for batch in batches {
            let scene_paths: Vec<(u32, PathBuf)> = batch
                .iter()
                .filter_map(|n| frames.get(n).map(|p| (*n, p.clone())))
                .collect();

            let batch_tracker = tracker.clone();
            let outcome = process_batch(
                &scene_paths,
                self.deps.ocr_pool.clone(),
                prompt.clone(),
                self.config.ocr_concurrency_per_provider,
                cancel.clone(),
                move |scene| batch_tracker.increment(Some(scene.to_string())),
            )
            .await;

            for (scene_number, result) in outcome.results {
                checkpoint.mark_ocr_scene_done(scene_number, result.text.clone());
                results.insert(scene_number, result);
                if checkpoint.completed_ocr_scenes.len() as u32 % self.config.ocr_checkpoint_interval == 0 {
                    self.deps.checkpoints.save(checkpoint).await?;
                }
            }
            for scene_number in &batch {
                if !results.contains_key(scene_number) {
                    // Frame extraction dropped this scene; record it empty
                    // so OCR coverage accounting stays consistent (§4.9.4).
                    checkpoint.mark_ocr_scene_done(*scene_number, String::new());
                    results.insert(*scene_number, vidwork_models::OcrResult::empty("none"));
                    tracker.increment(Some(scene_number.to_string()));
                }
            }
            for warning in &outcome.warnings {
                warn!(warning = %warning, "OCR batch warning");
            }

            self.deps.checkpoints.save(checkpoint).await?;
        }

        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_postprocess_and_upload(
        &self,
        upload_id: &UploadId,
        input: &JobInput,
        scenes: &[Scene],
        ocr_results: &HashMap<u32, vidwork_models::OcrResult>,
        transcription: &[vidwork_models::TranscriptionSegment],
        checkpoint: &mut Checkpoint,
        progress_tx: &mpsc::UnboundedSender<(Stage, u8, Option<String>)>,
    ) -> WorkerResult<String> {
        let scene_texts: Vec<SceneText> = scenes
            .iter()
            .map(|s| SceneText {
                scene_number: s.scene_number,
                text: ocr_results.get(&s.scene_number).map(|r| r.text.clone()).unwrap_or_default(),
                duration_secs: s.end_time - s.start_time,
            })
            .collect();
        let cleaned = postprocess_ocr(scene_texts);

        let _ = progress_tx.send((
            Stage::ExcelGeneration,
            scale_into_band(bands::POSTPROCESS, 100),
            Some("Building report".into()),
        ));

        let report_bytes = build_report(&input.file_name, scenes, &cleaned, transcription)?;

        let result_key = format!("{}/{}/report.xlsx", self.deps.result_bucket_prefix, upload_id.as_str());
        self.deps
            .storage
            .upload_bytes(
                report_bytes,
                &result_key,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )
            .await
            .map_err(WorkerError::from)?;

        checkpoint.advance_step(Stage::ExcelGeneration);
        self.deps.checkpoints.save(checkpoint).await?;

        let _ = progress_tx.send((Stage::ExcelGeneration, bands::UPLOAD.1, Some("Uploaded report".into())));
        self.deps.status.complete(upload_id, result_key.clone()).await?;
        Ok(result_key)
    }
}

fn prompt_for_mode(mode: DetectionMode) -> &'static str {
    match mode {
        DetectionMode::Standard => "Transcribe any on-screen text verbatim, ignoring decorative graphics.",
        DetectionMode::Enhanced => {
            "Transcribe any on-screen text verbatim, including partially obscured or low-contrast text, \
             and note speaker overlays distinctly from background captions."
        }
    }
}

/// Bridge a [`CancellationToken`] to the `watch::Receiver<bool>` shape
/// [`FfmpegRunner`] expects, so every external call in the orchestrator can
/// share one cancellation handle (§5) even though this crate's ffmpeg
/// wrapper predates `tokio-util`'s token type.
fn bridge_cancellation(
    cancel: CancellationToken,
    tx: tokio::sync::watch::Sender<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        cancel.cancelled().await;
        let _ = tx.send(true);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_cover_the_full_progress_range_without_gaps() {
        let all = [
            bands::DOWNLOAD,
            bands::PROBE,
            bands::EXTRACT_AUDIO,
            bands::TRANSCRIBE,
            bands::SCENE_DETECT,
            bands::EXTRACT_FRAMES,
            bands::OCR,
            bands::POSTPROCESS,
            bands::UPLOAD,
        ];
        assert_eq!(all[0].0, 0);
        assert_eq!(all[all.len() - 1].1, 100);
        for pair in all.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn scale_into_band_stays_within_bounds() {
        assert_eq!(scale_into_band(bands::OCR, 0), 65);
        assert_eq!(scale_into_band(bands::OCR, 100), 90);
        let mid = scale_into_band(bands::OCR, 50);
        assert!(mid > 65 && mid < 90);
    }
}
