//! OCR post-processing: persistent-overlay removal and consecutive-duplicate
//! suppression (§4.8.5).

use std::collections::HashMap;

/// Minimum number of scenes before overlay filtering runs at all.
pub const MIN_SCENES_FOR_OVERLAY_FILTER: usize = 3;
/// Minimum cumulative duration (seconds) a run of identical OCR text must
/// span before it is treated as meaningful rather than flicker.
pub const MIN_MEANINGFUL_RUN_SECS: f64 = 5.0;

/// One scene's OCR text plus the display duration it covers, in scene order.
#[derive(Debug, Clone)]
pub struct SceneText {
    pub scene_number: u32,
    pub text: String,
    pub duration_secs: f64,
}

/// The frequency threshold above which a line is considered a persistent
/// overlay (logo, watermark, lower-third) rather than scene content. The
/// threshold decays as the sample size grows, since a truly persistent
/// overlay should appear in a shrinking minimum fraction of scenes the more
/// scenes there are (§4.8.5).
fn overlay_threshold(total_scenes: usize) -> f64 {
    if total_scenes < 20 {
        0.8
    } else if total_scenes < 50 {
        0.7
    } else if total_scenes < 100 {
        0.6
    } else {
        0.5
    }
}

/// Strip lines that recur across a high enough fraction of scenes to be a
/// persistent overlay, then suppress consecutive duplicate scene texts that
/// don't represent a sustained (>=5s) on-screen caption.
pub fn postprocess_ocr(mut scenes: Vec<SceneText>) -> Vec<SceneText> {
    if scenes.len() >= MIN_SCENES_FOR_OVERLAY_FILTER {
        strip_persistent_overlays(&mut scenes);
    }
    suppress_flicker_duplicates(scenes)
}

fn strip_persistent_overlays(scenes: &mut [SceneText]) {
    let total = scenes.len();
    let threshold = overlay_threshold(total);
    let min_count = (threshold * total as f64).ceil() as usize;

    let mut line_counts: HashMap<&str, usize> = HashMap::new();
    for scene in scenes.iter() {
        for line in unique_nonempty_lines(&scene.text) {
            *line_counts.entry(line).or_insert(0) += 1;
        }
    }

    let overlay_lines: std::collections::HashSet<String> = line_counts
        .into_iter()
        .filter(|(_, count)| *count >= min_count.max(1))
        .map(|(line, _)| line.to_string())
        .collect();

    if overlay_lines.is_empty() {
        return;
    }

    for scene in scenes.iter_mut() {
        let filtered: Vec<&str> = scene
            .text
            .split('\n')
            .filter(|line| !overlay_lines.contains(*line))
            .collect();
        scene.text = filtered.join("\n");
    }
}

/// The distinct non-empty lines of `text`, deduplicated so a line repeated
/// twice within one scene only counts once toward that scene's tally.
fn unique_nonempty_lines(text: &str) -> std::collections::HashSet<&str> {
    text.split('\n').filter(|l| !l.is_empty()).collect()
}

/// Suppress a scene's text when it's identical to the previous *emitted*
/// scene's text, unless the cumulative duration of that identical-text run
/// has reached `MIN_MEANINGFUL_RUN_SECS` — at which point it's a sustained
/// caption, not a flicker artifact, and is kept visible on every scene in
/// the run.
fn suppress_flicker_duplicates(scenes: Vec<SceneText>) -> Vec<SceneText> {
    let mut out = Vec::with_capacity(scenes.len());
    let mut run_text: Option<String> = None;
    let mut run_duration = 0.0;

    for scene in scenes {
        let same_as_run = run_text.as_deref() == Some(scene.text.as_str());
        if same_as_run {
            run_duration += scene.duration_secs;
        } else {
            run_text = Some(scene.text.clone());
            run_duration = scene.duration_secs;
        }

        if !same_as_run || run_duration >= MIN_MEANINGFUL_RUN_SECS {
            out.push(scene);
        } else {
            out.push(SceneText {
                scene_number: scene.scene_number,
                text: String::new(),
                duration_secs: scene.duration_secs,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(n: u32, text: &str, duration: f64) -> SceneText {
        SceneText {
            scene_number: n,
            text: text.to_string(),
            duration_secs: duration,
        }
    }

    #[test]
    fn overlay_filter_skipped_below_min_scenes() {
        let scenes = vec![scene(0, "WATERMARK", 1.0), scene(1, "WATERMARK", 1.0)];
        let out = postprocess_ocr(scenes);
        assert_eq!(out[0].text, "WATERMARK");
    }

    #[test]
    fn persistent_line_is_stripped_from_every_scene() {
        let scenes: Vec<SceneText> = (0..10)
            .map(|i| scene(i, &format!("WATERMARK\nunique-{i}"), 1.0))
            .collect();
        let out = postprocess_ocr(scenes);
        for (i, s) in out.iter().enumerate() {
            assert!(!s.text.contains("WATERMARK"), "scene {i} still has overlay: {}", s.text);
            assert!(s.text.contains(&format!("unique-{i}")));
        }
    }

    #[test]
    fn short_flicker_run_is_suppressed() {
        let scenes = vec![
            scene(0, "HELLO", 1.0),
            scene(1, "HELLO", 1.0),
            scene(2, "HELLO", 1.0),
            scene(3, "GOODBYE", 1.0),
        ];
        let out = suppress_flicker_duplicates(scenes);
        assert_eq!(out[0].text, "HELLO");
        assert_eq!(out[1].text, "");
        assert_eq!(out[2].text, "");
        assert_eq!(out[3].text, "GOODBYE");
    }

    #[test]
    fn sustained_caption_past_five_seconds_is_kept() {
        let scenes = vec![
            scene(0, "CAPTION", 2.0),
            scene(1, "CAPTION", 2.0),
            scene(2, "CAPTION", 2.0),
            scene(3, "CAPTION", 2.0),
        ];
        let out = suppress_flicker_duplicates(scenes);
        // cumulative duration crosses 5s at scene index 2 (2+2+2=6.0)
        assert_eq!(out[0].text, "CAPTION");
        assert_eq!(out[1].text, "");
        assert_eq!(out[2].text, "CAPTION");
        assert_eq!(out[3].text, "CAPTION");
    }
}
