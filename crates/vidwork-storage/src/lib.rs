//! Object-store client for the video analysis worker (component C5).
//!
//! Wraps an S3-compatible bucket (Cloudflare R2) with the key layout and
//! access checks the rest of the worker depends on: every key lives under
//! `uploads/<userId>/<uploadId>/...` or `results/<userId>/<uploadId>/...`,
//! and callers are expected to validate a key against [`keys`] before
//! touching it.

pub mod client;
pub mod error;
pub mod keys;
pub mod ranged;

pub use client::{ObjectInfo, R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{audio_key, parse_key, report_key, source_video_key, validate_key, verify_owned_key, ParsedKey};
pub use ranged::{download_ranged, RangeProgressCallback, DEFAULT_STALL_MS};
