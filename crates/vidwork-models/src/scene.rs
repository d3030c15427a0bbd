//! Scene: derived from `sceneCuts` plus video duration, never persisted as
//! an independent entity (§3).

use serde::{Deserialize, Serialize};

use crate::checkpoint::SceneCut;

/// Scenes shorter than this are dropped (§3).
pub const MIN_SCENE_DURATION_SECS: f64 = 0.8;

/// Minimum spacing between adjacent scene-cut timestamps (§3, §4.6).
pub const MIN_SCENE_INTERVAL_SECS: f64 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub scene_number: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub mid_time: f64,
    pub screenshot_path: Option<String>,
    pub ocr_text: String,
    pub ocr_confidence: f64,
}

impl Scene {
    fn new(scene_number: u32, start_time: f64, end_time: f64) -> Self {
        Self {
            scene_number,
            start_time,
            end_time,
            mid_time: (start_time + end_time) / 2.0,
            screenshot_path: None,
            ocr_text: String::new(),
            ocr_confidence: 0.0,
        }
    }
}

/// Build the dense, 1-based scene list from scene cuts and total duration.
///
/// Boundaries are the sorted union of `0.0`, every cut timestamp, and
/// `duration`; consecutive boundary pairs shorter than
/// [`MIN_SCENE_DURATION_SECS`] are dropped and the survivors renumbered
/// densely, matching the invariant that scene numbers run `1..N` with no
/// gaps after filtering.
pub fn generate_scenes(scene_cuts: &[SceneCut], duration: f64) -> Vec<Scene> {
    if duration <= 0.0 {
        return Vec::new();
    }

    let mut boundaries: Vec<f64> = Vec::with_capacity(scene_cuts.len() + 2);
    boundaries.push(0.0);
    for cut in scene_cuts {
        if cut.timestamp > 0.0 && cut.timestamp < duration {
            boundaries.push(cut.timestamp);
        }
    }
    boundaries.push(duration);
    boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap());
    boundaries.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);

    let mut scenes = Vec::new();
    let mut number = 1u32;
    for window in boundaries.windows(2) {
        let (start, end) = (window[0], window[1]);
        if end - start >= MIN_SCENE_DURATION_SECS {
            scenes.push(Scene::new(number, start, end));
            number += 1;
        }
    }
    scenes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cut(ts: f64) -> SceneCut {
        SceneCut {
            timestamp: ts,
            confidence: 1.0,
        }
    }

    #[test]
    fn happy_small_path_from_the_spec() {
        // 30s video, cuts at {0, 12.5, 22.0}.
        let scenes = generate_scenes(&[cut(0.0), cut(12.5), cut(22.0)], 30.0);
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0].scene_number, 1);
        assert!((scenes[0].mid_time - 6.25).abs() < 1e-9);
        assert!((scenes[1].mid_time - 17.25).abs() < 1e-9);
        assert!((scenes[2].mid_time - 26.0).abs() < 1e-9);
    }

    #[test]
    fn scene_cut_at_zero_does_not_create_an_empty_leading_scene() {
        let scenes = generate_scenes(&[cut(0.0)], 10.0);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].start_time, 0.0);
    }

    #[test]
    fn short_scenes_are_dropped_and_numbering_stays_dense() {
        // Cuts 0.3s apart produce a sub-threshold scene that must vanish
        // without leaving a gap in scene_number.
        let scenes = generate_scenes(&[cut(5.0), cut(5.3), cut(10.0)], 20.0);
        for (i, s) in scenes.iter().enumerate() {
            assert_eq!(s.scene_number, (i + 1) as u32);
        }
        assert!(scenes.iter().all(|s| s.end_time - s.start_time >= MIN_SCENE_DURATION_SECS));
    }
}
