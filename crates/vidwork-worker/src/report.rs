//! Report generation (§4.9.1 `ExcelGeneration`).
//!
//! The only format-level requirement the spec carries is that the result
//! is a structured spreadsheet a human reviewer can open directly; exact
//! column layout is left to the implementation. One sheet lists OCR
//! findings per scene, a second lists the merged transcription.

use rust_xlsxwriter::{Format, Workbook};
use vidwork_models::{Scene, TranscriptionSegment};
use vidwork_ocr::SceneText;

use crate::error::{WorkerError, WorkerResult};

pub fn build_report(
    file_name: &str,
    scenes: &[Scene],
    ocr: &[SceneText],
    transcription: &[TranscriptionSegment],
) -> WorkerResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let scene_by_number: std::collections::HashMap<u32, &Scene> =
        scenes.iter().map(|s| (s.scene_number, s)).collect();

    let ocr_sheet = workbook.add_worksheet().set_name("On-screen text").map_err(xlsx_err)?;
    ocr_sheet.write_string_with_format(0, 0, "Scene", &header).map_err(xlsx_err)?;
    ocr_sheet.write_string_with_format(0, 1, "Start (s)", &header).map_err(xlsx_err)?;
    ocr_sheet.write_string_with_format(0, 2, "End (s)", &header).map_err(xlsx_err)?;
    ocr_sheet.write_string_with_format(0, 3, "Text", &header).map_err(xlsx_err)?;
    for (i, scene_text) in ocr.iter().enumerate() {
        let row = (i + 1) as u32;
        ocr_sheet.write_number(row, 0, scene_text.scene_number as f64).map_err(xlsx_err)?;
        if let Some(scene) = scene_by_number.get(&scene_text.scene_number) {
            ocr_sheet.write_number(row, 1, scene.start_time).map_err(xlsx_err)?;
            ocr_sheet.write_number(row, 2, scene.end_time).map_err(xlsx_err)?;
        }
        ocr_sheet.write_string(row, 3, &scene_text.text).map_err(xlsx_err)?;
    }

    let transcript_sheet = workbook.add_worksheet().set_name("Transcription").map_err(xlsx_err)?;
    transcript_sheet.write_string_with_format(0, 0, "Start (s)", &header).map_err(xlsx_err)?;
    transcript_sheet.write_string_with_format(0, 1, "Duration (s)", &header).map_err(xlsx_err)?;
    transcript_sheet.write_string_with_format(0, 2, "Text", &header).map_err(xlsx_err)?;
    transcript_sheet.write_string_with_format(0, 3, "Confidence", &header).map_err(xlsx_err)?;
    for (i, segment) in transcription.iter().enumerate() {
        let row = (i + 1) as u32;
        transcript_sheet.write_number(row, 0, segment.start).map_err(xlsx_err)?;
        transcript_sheet.write_number(row, 1, segment.duration).map_err(xlsx_err)?;
        transcript_sheet.write_string(row, 2, &segment.text).map_err(xlsx_err)?;
        transcript_sheet.write_number(row, 3, segment.confidence).map_err(xlsx_err)?;
    }

    let summary_sheet = workbook.add_worksheet().set_name("Summary").map_err(xlsx_err)?;
    summary_sheet.write_string(0, 0, "Source file").map_err(xlsx_err)?;
    summary_sheet.write_string(0, 1, file_name).map_err(xlsx_err)?;
    summary_sheet.write_string(1, 0, "Scenes").map_err(xlsx_err)?;
    summary_sheet.write_number(1, 1, scenes.len() as f64).map_err(xlsx_err)?;
    summary_sheet.write_string(2, 0, "Transcription segments").map_err(xlsx_err)?;
    summary_sheet.write_number(2, 1, transcription.len() as f64).map_err(xlsx_err)?;

    workbook.save_to_buffer().map_err(xlsx_err)
}

fn xlsx_err(e: rust_xlsxwriter::XlsxError) -> WorkerError {
    WorkerError::Internal(format!("report generation failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(n: u32, start: f64, end: f64) -> Scene {
        Scene {
            scene_number: n,
            start_time: start,
            end_time: end,
            mid_time: (start + end) / 2.0,
            screenshot_path: None,
            ocr_text: String::new(),
            ocr_confidence: 0.0,
        }
    }

    #[test]
    fn builds_a_nonempty_workbook_with_no_scenes() {
        let bytes = build_report("video.mp4", &[], &[], &[]).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn builds_a_workbook_with_ocr_and_transcription_rows() {
        let scenes = vec![scene(1, 0.0, 5.0), scene(2, 5.0, 10.0)];
        let ocr = vec![
            SceneText { scene_number: 1, text: "SALE".into(), duration_secs: 5.0 },
            SceneText { scene_number: 2, text: String::new(), duration_secs: 5.0 },
        ];
        let transcription = vec![TranscriptionSegment {
            start: 0.0,
            duration: 3.0,
            text: "hello world".into(),
            confidence: 0.95,
        }];
        let bytes = build_report("video.mp4", &scenes, &ocr, &transcription).unwrap();
        assert!(bytes.len() > 100);
    }
}
