#![deny(unreachable_patterns)]
//! Video processing worker.
//!
//! Owns the stage pipeline that turns an uploaded video into an Excel
//! report of on-screen text and transcription (§4): download, probe,
//! audio extraction, transcription, scene detection, frame extraction,
//! OCR, postprocessing, and report upload. One process handles exactly
//! one job at a time; everything else (HTTP surface, job queueing) lives
//! above this crate.

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod shutdown;
pub mod transcription;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::{Orchestrator, OrchestratorDeps};
pub use shutdown::{InFlightJob, ShutdownCoordinator, INTERRUPTED_MESSAGE};
