//! Speech/silence detection primitives, used to drive ASR chunking (§4.7).

pub mod vad;

pub use vad::{create_shared_vad, SharedVad, SileroVad, VadError, VadResult};
