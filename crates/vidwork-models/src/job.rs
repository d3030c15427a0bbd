//! Job: the externally observable unit of work (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{UploadId, UserId};

/// `detectionMode` on the immutable input descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    #[default]
    Standard,
    Enhanced,
}

impl DetectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMode::Standard => "standard",
            DetectionMode::Enhanced => "enhanced",
        }
    }
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The immutable input descriptor a job is created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInput {
    /// Object-store key of the source video.
    pub storage_key: String,
    pub file_name: String,
    pub detection_mode: DetectionMode,
    pub data_consent: bool,
}

/// `currentStep` domain, reused as the orchestrator's phase identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Downloading,
    AudioExtraction,
    Transcription,
    SceneDetection,
    Ocr,
    ExcelGeneration,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Downloading => "downloading",
            Stage::AudioExtraction => "audio_extraction",
            Stage::Transcription => "transcription",
            Stage::SceneDetection => "scene_detection",
            Stage::Ocr => "ocr",
            Stage::ExcelGeneration => "excel_generation",
        }
    }

    /// 1-based ordinal used as the status row's coarse `phase` field.
    pub fn ordinal(self) -> u8 {
        match self {
            Stage::Downloading => 1,
            Stage::AudioExtraction => 2,
            Stage::Transcription => 3,
            Stage::SceneDetection => 4,
            Stage::Ocr => 5,
            Stage::ExcelGeneration => 6,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The job's state machine (§3: `pending -> processing -> (completed|error)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing {
        stage: Stage,
        progress: u8,
        sub_task: Option<String>,
    },
    Completed {
        result_key: String,
    },
    Error {
        error_code: String,
        message: String,
    },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Error { .. })
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing { .. } => "processing",
            JobState::Completed { .. } => "completed",
            JobState::Error { .. } => "error",
        }
    }

    /// Relative ordering used to enforce "transitions only go forward,
    /// except to `error`" (§3). `Processing` at a later stage outranks one
    /// at an earlier stage; any state outranks nothing when moving to
    /// `Error`, which is always permitted.
    fn rank(&self) -> u32 {
        match self {
            JobState::Pending => 0,
            JobState::Processing { stage, progress, .. } => {
                1000 + (stage.ordinal() as u32) * 100 + (*progress as u32)
            }
            JobState::Completed { .. } => 100_000,
            JobState::Error { .. } => 0, // not ranked against forward progress
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        if matches!(next, JobState::Error { .. }) {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

/// A job row as persisted by the Status Store (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub upload_id: UploadId,
    pub user_id: UserId,
    pub input: JobInput,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(upload_id: UploadId, user_id: UserId, input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            upload_id,
            user_id,
            input,
            state: JobState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a state transition, enforcing §3's forward-only rule.
    /// Downgrading a terminal state is a no-op, matching testable property 3.
    pub fn set_state(&mut self, next: JobState) {
        if self.state.can_transition_to(&next) {
            self.state = next;
            self.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            UploadId::new("upload_1_ab"),
            UserId::new("user-1"),
            JobInput {
                storage_key: "uploads/user-1/upload_1_ab/source.mp4".into(),
                file_name: "source.mp4".into(),
                detection_mode: DetectionMode::Standard,
                data_consent: true,
            },
        )
    }

    #[test]
    fn new_job_is_pending_with_zero_progress() {
        let j = job();
        assert_eq!(j.state.status_str(), "pending");
        assert!(!j.state.is_terminal());
    }

    #[test]
    fn terminal_state_is_final() {
        let mut j = job();
        j.set_state(JobState::Completed {
            result_key: "results/user-1/upload_1_ab/report.xlsx".into(),
        });
        assert!(j.state.is_terminal());

        // Attempting to downgrade back to processing must be a no-op.
        j.set_state(JobState::Processing {
            stage: Stage::Ocr,
            progress: 80,
            sub_task: None,
        });
        assert!(matches!(j.state, JobState::Completed { .. }));
    }

    #[test]
    fn error_is_reachable_from_any_state() {
        let mut j = job();
        j.set_state(JobState::Error {
            error_code: "INTERNAL".into(),
            message: "boom".into(),
        });
        assert!(j.state.is_terminal());
    }

    #[test]
    fn progress_is_monotonic_within_processing() {
        let mut j = job();
        j.set_state(JobState::Processing {
            stage: Stage::Ocr,
            progress: 70,
            sub_task: None,
        });
        j.set_state(JobState::Processing {
            stage: Stage::Ocr,
            progress: 40,
            sub_task: None,
        });
        // Downgrade within a non-terminal state is rejected too.
        if let JobState::Processing { progress, .. } = j.state {
            assert_eq!(progress, 70);
        } else {
            panic!("expected processing state");
        }
    }
}
