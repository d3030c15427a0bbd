//! The status row's `metadata` blob (§6), strongly typed per the redesign
//! hint in §9 ("not a generic map"). Every field round-trips through the
//! Status Store's document-store encoding unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusMetadata {
    pub phase: Option<i32>,
    pub phase_progress: Option<i32>,
    pub phase_status: Option<String>,
    pub sub_task: Option<String>,
    pub estimated_time_remaining: Option<i64>,
    pub result_r2_key: Option<String>,
    pub file_name: Option<String>,
    pub duration: Option<f64>,
    pub segment_count: Option<i32>,
    pub ocr_result_count: Option<i32>,
    pub total_scenes: Option<i32>,
    pub scenes_with_ocr: Option<i32>,
    pub scenes_with_narration: Option<i32>,
    pub detection_mode: Option<String>,
    pub error_code: Option<String>,
    pub warnings: Option<Vec<String>>,
}

impl StatusMetadata {
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.get_or_insert_with(Vec::new).push(warning.into());
    }
}
