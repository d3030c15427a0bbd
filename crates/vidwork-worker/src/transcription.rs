//! Transcription dispatch (component C7, §4.7).
//!
//! For audio under [`vidwork_media::MIN_DURATION_FOR_CHUNKING_SECS`] this
//! runs VAD once over the whole file; longer audio is first split into
//! fixed, overlapping chunks by [`vidwork_media::split_audio_into_chunks`]
//! so no single provider call ever sees more than a few minutes of audio.
//! Each chunk's speech segments are transcribed independently and their
//! timestamps translated back to the source timeline before merging.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vidwork_media::{
    command::{FfmpegCommand, FfmpegRunner},
    segment_speech, split_audio_into_chunks, SharedVad, SpeechSegment,
};
use vidwork_models::{Checkpoint, TranscriptionSegment};
use vidwork_ocr::{transcribe_with_failover, AsrProviderPool};

use crate::error::WorkerResult;

/// Speech segments whose gap is smaller than this are treated as one
/// continuous utterance split only by the chunk boundary, and merged if
/// their transcribed text is identical (duplicate words the 1s chunk
/// overlap produced on both sides of the cut).
const MERGE_GAP_SECS: f64 = 1.2;

/// Run VAD + ASR over `audio_path`, resuming from `checkpoint` if it
/// already has some chunks completed, and checkpointing progress every
/// `checkpoint_interval` completed chunks.
#[allow(clippy::too_many_arguments)]
pub async fn transcribe(
    audio_path: &Path,
    duration: f64,
    work_dir: &Path,
    vad: SharedVad,
    asr_pool: &AsrProviderPool,
    checkpoint: &mut Checkpoint,
    checkpoint_interval: u32,
    mut on_chunk_done: impl FnMut(&mut Checkpoint),
    cancel: &CancellationToken,
) -> WorkerResult<Vec<TranscriptionSegment>> {
    if checkpoint.total_audio_chunks > 0
        && checkpoint.completed_audio_chunks.len() as u32 == checkpoint.total_audio_chunks
    {
        info!(upload_id = %checkpoint.upload_id, "transcription already complete, reusing checkpoint");
        return Ok(checkpoint.transcription_segments.clone());
    }

    let chunk_dir = work_dir.join("audio_chunks");
    let chunks = split_audio_into_chunks(audio_path, duration, &chunk_dir).await?;
    checkpoint.total_audio_chunks = chunks.len() as u32;

    let mut segments = checkpoint.transcription_segments.clone();
    let runner = FfmpegRunner::new();

    for (index, chunk) in chunks.iter().enumerate() {
        let index = index as u32;
        if checkpoint.completed_audio_chunks.contains(&index) {
            continue;
        }
        if cancel.is_cancelled() {
            return Err(crate::error::WorkerError::Cancelled);
        }

        let pcm_path = chunk_dir.join(format!("chunk_{index:04}.pcm"));
        let samples = decode_pcm_f32_mono_16k(&chunk.path, &pcm_path, &runner).await?;
        let speech_segments = segment_speech(&samples, 16_000, vad.clone()).await?;

        for speech in &speech_segments {
            if cancel.is_cancelled() {
                return Err(crate::error::WorkerError::Cancelled);
            }
            match transcribe_one_segment(&chunk.path, speech, &chunk_dir, index, &runner, asr_pool, cancel).await {
                Some(mut segment) => {
                    segment.start += chunk.start;
                    segments.push(segment);
                }
                None => {
                    warn!(chunk = index, "speech segment produced no transcription, skipping");
                }
            }
        }

        checkpoint.mark_audio_chunk_done(index);
        if checkpoint.completed_audio_chunks.len() as u32 % checkpoint_interval == 0 {
            on_chunk_done(checkpoint);
        }
    }

    segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap());
    let merged = merge_adjacent_duplicates(segments);
    checkpoint.transcription_segments = merged.clone();
    on_chunk_done(checkpoint);
    Ok(merged)
}

async fn transcribe_one_segment(
    chunk_path: &Path,
    speech: &SpeechSegment,
    work_dir: &Path,
    chunk_index: u32,
    runner: &FfmpegRunner,
    asr_pool: &AsrProviderPool,
    cancel: &CancellationToken,
) -> Option<TranscriptionSegment> {
    let slice_path = work_dir.join(format!(
        "speech_{chunk_index:04}_{:08}.wav",
        (speech.start * 1000.0) as u64
    ));
    let cmd = FfmpegCommand::new(chunk_path, &slice_path)
        .seek(speech.start)
        .duration(speech.end - speech.start)
        .audio_codec("pcm_s16le")
        .log_level("error");
    if runner.run(&cmd).await.is_err() {
        return None;
    }
    let audio_bytes = tokio::fs::read(&slice_path).await.ok()?;
    let _ = tokio::fs::remove_file(&slice_path).await;

    transcribe_with_failover(asr_pool, &audio_bytes, speech.start, speech.end - speech.start, cancel).await
}

async fn decode_pcm_f32_mono_16k(input: &Path, out_path: &Path, runner: &FfmpegRunner) -> WorkerResult<Vec<f32>> {
    let cmd = FfmpegCommand::new(input, out_path)
        .output_args(["-f", "f32le", "-ar", "16000", "-ac", "1"])
        .log_level("error");
    runner.run(&cmd).await?;
    let bytes = tokio::fs::read(out_path).await?;
    let _ = tokio::fs::remove_file(out_path).await;
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Collapse consecutive segments that have identical text and start within
/// [`MERGE_GAP_SECS`] of the previous segment's end into one, taking the
/// union of their time span. This is what dedupes a sentence that landed on
/// both sides of a chunk's overlap window.
fn merge_adjacent_duplicates(segments: Vec<TranscriptionSegment>) -> Vec<TranscriptionSegment> {
    let mut merged: Vec<TranscriptionSegment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if let Some(last) = merged.last_mut() {
            let gap = segment.start - (last.start + last.duration);
            if last.text == segment.text && gap < MERGE_GAP_SECS {
                let new_end = (segment.start + segment.duration).max(last.start + last.duration);
                last.duration = new_end - last.start;
                continue;
            }
        }
        merged.push(segment);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, duration: f64, text: &str) -> TranscriptionSegment {
        TranscriptionSegment {
            start,
            duration,
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn identical_adjacent_segments_merge_into_one() {
        let merged = merge_adjacent_duplicates(vec![
            seg(0.0, 2.0, "hello there"),
            seg(2.2, 1.0, "hello there"),
        ]);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].duration - 3.2).abs() < 1e-9);
    }

    #[test]
    fn distinct_text_never_merges() {
        let merged = merge_adjacent_duplicates(vec![seg(0.0, 2.0, "one"), seg(2.1, 1.0, "two")]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn a_large_gap_keeps_segments_separate_even_with_identical_text() {
        let merged = merge_adjacent_duplicates(vec![seg(0.0, 2.0, "again"), seg(10.0, 1.0, "again")]);
        assert_eq!(merged.len(), 2);
    }
}
