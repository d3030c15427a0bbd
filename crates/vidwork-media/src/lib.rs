//! FFmpeg/FFprobe process wrapper for the video analysis pipeline
//! (component C6, plus the VAD half of C7).
//!
//! Every external process invocation goes through [`command::FfmpegRunner`]
//! with an explicit argv (never a shell string), a cancellation channel, and
//! an optional timeout, so the orchestrator can always kill a stuck
//! extraction cleanly.

pub mod chunking;
pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod scenecut;
pub mod silence_removal;

pub use chunking::{
    segment_speech, split_audio_into_chunks, AudioChunk, SpeechSegment, CHUNK_DURATION_SECS,
    MAX_CHUNK_DURATION_SECS, MIN_DURATION_FOR_CHUNKING_SECS, MIN_SPEECH_DURATION_SECS,
    OVERLAP_DURATION_SECS, VAD_SENSITIVITY,
};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use probe::{get_duration, probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use scenecut::{detect_scene_cuts, MIN_SCENE_INTERVAL_SECS};
pub use silence_removal::{create_shared_vad, SharedVad, SileroVad};
