//! Shared data model for the video analysis worker.
//!
//! Every other crate in the workspace depends on this one for the job/
//! checkpoint/scene vocabulary so that the orchestrator, the document-store
//! client, and the HTTP surface never disagree about shapes.

pub mod checkpoint;
pub mod error;
pub mod ids;
pub mod job;
pub mod ocr_result;
pub mod scene;
pub mod status_metadata;

pub use checkpoint::{Checkpoint, SceneCut, TranscriptionSegment, CHECKPOINT_TTL_DAYS};
pub use error::ErrorKind;
pub use ids::{UploadId, UserId};
pub use job::{DetectionMode, Job, JobInput, JobState, Stage};
pub use ocr_result::OcrResult;
pub use scene::{generate_scenes, Scene, MIN_SCENE_DURATION_SECS, MIN_SCENE_INTERVAL_SECS};
pub use status_metadata::StatusMetadata;
