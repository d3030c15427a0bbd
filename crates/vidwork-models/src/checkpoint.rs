//! Checkpoint: the durable record of resumable pipeline state (§3, §4.4).

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UploadId;
use crate::job::Stage;

/// One transcribed speech segment, absolute-time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub start: f64,
    pub duration: f64,
    pub text: String,
    pub confidence: f64,
}

/// One detected scene-cut timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneCut {
    pub timestamp: f64,
    pub confidence: f64,
}

/// Durable pipeline state for a single active job, keyed by `uploadId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub upload_id: UploadId,
    pub current_step: Stage,
    pub intermediate_video_path: Option<String>,
    pub intermediate_audio_path: Option<String>,
    pub video_duration: Option<f64>,
    pub total_audio_chunks: u32,
    pub total_scenes: u32,
    pub completed_audio_chunks: BTreeSet<u32>,
    pub transcription_segments: Vec<TranscriptionSegment>,
    pub scene_cuts: Vec<SceneCut>,
    pub completed_ocr_scenes: BTreeSet<u32>,
    pub ocr_results: HashMap<u32, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub retry_count: u32,
    pub version: u64,
    /// The Firestore document `updateTime` this checkpoint was last loaded
    /// or saved against. Never persisted as document data — the store sets
    /// it from the document it just read or wrote, and `save()` uses it as
    /// the CAS precondition so a stale in-memory checkpoint can't silently
    /// clobber progress it never saw (§4.4).
    #[serde(skip)]
    pub observed_update_time: Option<String>,
}

/// TTL applied to every freshly created checkpoint (§3: "createdAt + 7 days").
pub const CHECKPOINT_TTL_DAYS: i64 = 7;

impl Checkpoint {
    pub fn new(upload_id: UploadId) -> Self {
        let now = Utc::now();
        Self {
            upload_id,
            current_step: Stage::Downloading,
            intermediate_video_path: None,
            intermediate_audio_path: None,
            video_duration: None,
            total_audio_chunks: 0,
            total_scenes: 0,
            completed_audio_chunks: BTreeSet::new(),
            transcription_segments: Vec::new(),
            scene_cuts: Vec::new(),
            completed_ocr_scenes: BTreeSet::new(),
            ocr_results: HashMap::new(),
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::days(CHECKPOINT_TTL_DAYS),
            retry_count: 0,
            version: 0,
            observed_update_time: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Validate the invariants listed in §3. Used in tests and defensively
    /// before a save, so a bug never persists a corrupt row.
    pub fn check_invariants(&self) -> Result<(), String> {
        for &idx in &self.completed_audio_chunks {
            if idx >= self.total_audio_chunks {
                return Err(format!(
                    "completed_audio_chunks contains {idx} but total_audio_chunks is {}",
                    self.total_audio_chunks
                ));
            }
        }

        for &idx in &self.completed_ocr_scenes {
            if !self.ocr_results.contains_key(&idx) {
                return Err(format!("completed_ocr_scenes contains {idx} with no ocr_results entry"));
            }
        }

        if !self
            .transcription_segments
            .windows(2)
            .all(|w| w[0].start <= w[1].start)
        {
            return Err("transcription_segments is not sorted by start".into());
        }

        if !self.scene_cuts.windows(2).all(|w| w[0].timestamp < w[1].timestamp) {
            return Err("scene_cuts is not strictly increasing".into());
        }

        Ok(())
    }

    /// Record a completed audio chunk, bumping `updated_at`. Does not touch
    /// `version`; callers CAS through the checkpoint store.
    pub fn mark_audio_chunk_done(&mut self, index: u32) {
        self.completed_audio_chunks.insert(index);
        self.updated_at = Utc::now();
    }

    /// Record a completed OCR scene and its result.
    pub fn mark_ocr_scene_done(&mut self, index: u32, text: String) {
        self.ocr_results.insert(index, text);
        self.completed_ocr_scenes.insert(index);
        self.updated_at = Utc::now();
    }

    /// Advance `current_step`, refusing to go backwards.
    pub fn advance_step(&mut self, step: Stage) {
        if step.ordinal() >= self.current_step.ordinal() {
            self.current_step = step;
            self.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_checkpoint_satisfies_invariants() {
        let cp = Checkpoint::new(UploadId::new("u1"));
        assert!(cp.check_invariants().is_ok());
        assert!(!cp.is_expired(Utc::now()));
    }

    #[test]
    fn expires_seven_days_after_creation() {
        let cp = Checkpoint::new(UploadId::new("u1"));
        let almost = cp.created_at + Duration::days(CHECKPOINT_TTL_DAYS) - Duration::seconds(1);
        assert!(!cp.is_expired(almost));
        let past = cp.created_at + Duration::days(CHECKPOINT_TTL_DAYS) + Duration::seconds(1);
        assert!(cp.is_expired(past));
    }

    #[test]
    fn rejects_ocr_index_without_result() {
        let mut cp = Checkpoint::new(UploadId::new("u1"));
        cp.completed_ocr_scenes.insert(0);
        assert!(cp.check_invariants().is_err());
    }

    #[test]
    fn step_does_not_regress() {
        let mut cp = Checkpoint::new(UploadId::new("u1"));
        cp.advance_step(Stage::Ocr);
        cp.advance_step(Stage::Downloading);
        assert_eq!(cp.current_step, Stage::Ocr);
    }
}
