//! `OCRResult`: the value a provider returns for a single frame (§4.8.1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f64,
    pub provider: String,
    pub elapsed_ms: u64,
}

impl OcrResult {
    /// The result recorded when every provider has exhausted its retry
    /// budget for a scene (§4.8.3, step 4).
    pub fn empty(provider: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            provider: provider.into(),
            elapsed_ms: 0,
        }
    }
}
