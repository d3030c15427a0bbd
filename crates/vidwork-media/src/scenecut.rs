//! Scene-cut detection (§4.6, `DetectSceneCuts`).
//!
//! Runs ffmpeg's `select='gt(scene,T)'` + `showinfo` filter at three
//! thresholds and merges the hits, rather than trusting a single threshold.
//! A low threshold over-detects fades and camera shake; a high one misses
//! soft cuts. Running all three and keeping every distinct timestamp (merged
//! by proximity, keeping the earlier of any two neighbors) gets closer to
//! what a human would mark as a cut than any single pass.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;
use vidwork_models::SceneCut;

use crate::error::{MediaError, MediaResult};

/// Detection thresholds run in sequence, most to least selective isn't
/// relevant here: all three always run and their hits are merged.
const THRESHOLDS: [f64; 3] = [0.02, 0.05, 0.08];

/// Minimum spacing enforced between two reported cuts (§3, §4.6).
pub const MIN_SCENE_INTERVAL_SECS: f64 = 2.0;

/// Detect scene cuts in `input`, merging hits from three detection
/// thresholds and dropping any that land within [`MIN_SCENE_INTERVAL_SECS`]
/// of a stronger neighbor.
pub async fn detect_scene_cuts(input: impl AsRef<Path>) -> MediaResult<Vec<SceneCut>> {
    let input = input.as_ref();
    let mut by_timestamp: std::collections::BTreeMap<i64, f64> = std::collections::BTreeMap::new();

    for &threshold in &THRESHOLDS {
        for cut in run_single_pass(input, threshold).await? {
            // Bucket to whole deciseconds so near-duplicate hits across
            // passes collapse into one entry instead of three close ones.
            let bucket = (cut.timestamp * 10.0).round() as i64;
            by_timestamp
                .entry(bucket)
                .and_modify(|existing| {
                    if cut.confidence > *existing {
                        *existing = cut.confidence;
                    }
                })
                .or_insert(cut.confidence);
        }
    }

    let mut cuts: Vec<SceneCut> = by_timestamp
        .into_iter()
        .map(|(bucket, confidence)| SceneCut {
            timestamp: bucket as f64 / 10.0,
            confidence,
        })
        .collect();
    cuts.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());

    Ok(enforce_min_interval(cuts.drain(..).collect()))
}

/// Drop cuts that land within `MIN_SCENE_INTERVAL_SECS` of a preceding kept
/// cut, scanning left to right and always keeping the earlier cut in each
/// cluster regardless of confidence (§4.6).
fn enforce_min_interval(cuts: Vec<SceneCut>) -> Vec<SceneCut> {
    let mut kept: Vec<SceneCut> = Vec::with_capacity(cuts.len());
    for cut in cuts {
        match kept.last() {
            Some(prev) if cut.timestamp - prev.timestamp < MIN_SCENE_INTERVAL_SECS => {}
            _ => kept.push(cut),
        }
    }
    kept
}

async fn run_single_pass(input: &Path, threshold: f64) -> MediaResult<Vec<SceneCut>> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    let filter = format!("select='gt(scene,{threshold})',showinfo");
    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vf".to_string(),
        filter,
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ];

    debug!(?threshold, "running scene-cut detection pass");

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let stderr = child.stderr.take().expect("stderr not captured");
    let mut lines = BufReader::new(stderr).lines();
    let mut cuts = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if let Some(cut) = parse_showinfo_line(&line, threshold) {
            cuts.push(cut);
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(MediaError::ffmpeg_failed(
            "scene-cut detection pass failed",
            None,
            status.code(),
        ));
    }

    Ok(cuts)
}

/// Parse one `showinfo` line for its `pts_time:` field, using the pass
/// threshold as the reported confidence (a higher threshold that still
/// fires is a stronger signal of an actual cut).
fn parse_showinfo_line(line: &str, threshold: f64) -> Option<SceneCut> {
    if !line.contains("Parsed_showinfo") {
        return None;
    }
    let marker = "pts_time:";
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find(' ').unwrap_or(rest.len());
    let timestamp: f64 = rest[..end].parse().ok()?;

    Some(SceneCut {
        timestamp,
        confidence: threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cut(ts: f64, conf: f64) -> SceneCut {
        SceneCut {
            timestamp: ts,
            confidence: conf,
        }
    }

    #[test]
    fn parses_pts_time_from_showinfo_output() {
        let line = "[Parsed_showinfo_1 @ 0x7f] n:   3 pts: 123456 pts_time:5.140000 pos: 1 fmt:yuv420p";
        let parsed = parse_showinfo_line(line, 0.05).unwrap();
        assert!((parsed.timestamp - 5.14).abs() < 1e-6);
        assert_eq!(parsed.confidence, 0.05);
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert!(parse_showinfo_line("frame=  100 fps=30", 0.05).is_none());
    }

    #[test]
    fn min_interval_keeps_earlier_neighbor() {
        let cuts = vec![cut(10.0, 0.02), cut(11.0, 0.08), cut(20.0, 0.02)];
        let kept = enforce_min_interval(cuts);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].timestamp, 10.0);
        assert_eq!(kept[1].timestamp, 20.0);
    }

    #[test]
    fn distinct_hits_beyond_interval_all_survive() {
        let cuts = vec![cut(0.5, 0.02), cut(5.0, 0.02), cut(10.0, 0.02)];
        let kept = enforce_min_interval(cuts);
        assert_eq!(kept.len(), 3);
    }
}
