//! Throttled progress tracker (component C2, §4.2).
//!
//! One tracker per pipeline phase. `increment` is lock-protected so the OCR
//! engine's worker pool can call it from every concurrent task without
//! losing updates; emission is throttled so a fast-moving phase (thousands
//! of frames) doesn't flood the status store or progress channel, but the
//! final completion always emits regardless of the throttle window.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{ProgressError, ProgressResult};

/// A point-in-time view of a tracker's counters, handed to `onProgress`.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub upload_id: String,
    pub phase_label: String,
    pub completed: u64,
    pub total_items: u64,
    pub last_item_label: Option<String>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> u8 {
        if self.total_items == 0 {
            0
        } else {
            ((self.completed * 100) / self.total_items).min(100) as u8
        }
    }
}

pub type OnProgress = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

struct TrackerState {
    completed: u64,
    total_items: u64,
    last_item_label: Option<String>,
    last_emitted_at: Option<Instant>,
}

/// Throttled counter with guaranteed-final-emission semantics.
pub struct ProgressTracker {
    upload_id: String,
    phase_label: String,
    state: Mutex<TrackerState>,
    on_progress: Option<OnProgress>,
    throttle: Duration,
}

impl ProgressTracker {
    pub fn new(
        upload_id: impl Into<String>,
        total_items: u64,
        phase_label: impl Into<String>,
        on_progress: Option<OnProgress>,
        throttle_ms: u64,
    ) -> ProgressResult<Self> {
        if total_items == 0 {
            return Err(ProgressError::InvalidArgument(
                "totalItems must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            upload_id: upload_id.into(),
            phase_label: phase_label.into(),
            state: Mutex::new(TrackerState {
                completed: 0,
                total_items,
                last_item_label: None,
                last_emitted_at: None,
            }),
            on_progress,
            throttle: Duration::from_millis(throttle_ms),
        })
    }

    /// Bump the completed counter (capped at `totalItems`), record the item
    /// label, and emit if the throttle window elapsed or this is the final
    /// item.
    pub fn increment(&self, item_label: Option<String>) {
        let snapshot = {
            let mut state = self.state.lock().expect("progress tracker mutex poisoned");
            state.completed = (state.completed + 1).min(state.total_items);
            if item_label.is_some() {
                state.last_item_label = item_label;
            }

            let now = Instant::now();
            let is_final = state.completed == state.total_items;
            let throttle_elapsed = state
                .last_emitted_at
                .map(|t| now.duration_since(t) >= self.throttle)
                .unwrap_or(true);

            if !(is_final || throttle_elapsed) {
                return;
            }
            state.last_emitted_at = Some(now);
            self.snapshot_locked(&state)
        };

        if let Some(cb) = &self.on_progress {
            cb(&snapshot);
        }
    }

    /// Raise or lower the total item count. Only valid if `n >= completed`.
    pub fn set_total_items(&self, n: u64) -> ProgressResult<()> {
        let mut state = self.state.lock().expect("progress tracker mutex poisoned");
        if n < state.completed {
            return Err(ProgressError::InvalidArgument(format!(
                "totalItems {n} is below the {} already completed",
                state.completed
            )));
        }
        state.total_items = n;
        Ok(())
    }

    /// Zero the counters for reuse across a new phase, keeping the same
    /// upload id and phase label.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("progress tracker mutex poisoned");
        state.completed = 0;
        state.last_item_label = None;
        state.last_emitted_at = None;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock().expect("progress tracker mutex poisoned");
        self.snapshot_locked(&state)
    }

    fn snapshot_locked(&self, state: &TrackerState) -> ProgressSnapshot {
        ProgressSnapshot {
            upload_id: self.upload_id.clone(),
            phase_label: self.phase_label.clone(),
            completed: state.completed,
            total_items: state.total_items,
            last_item_label: state.last_item_label.clone(),
        }
    }

    /// Phase-specific human-readable string, e.g.
    /// `"Processing frame 500/3106 (16%)"`.
    pub fn format_subtask(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "{} {}/{} ({}%)",
            self.phase_label,
            snapshot.completed,
            snapshot.total_items,
            snapshot.percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn rejects_zero_total_items() {
        let result = ProgressTracker::new("u1", 0, "Processing frame", None, 0);
        assert!(result.is_err());
    }

    #[test]
    fn final_increment_always_emits_despite_throttle() {
        let emissions = Arc::new(AtomicUsize::new(0));
        let cb_emissions = emissions.clone();
        let tracker = ProgressTracker::new(
            "u1",
            2,
            "Processing frame",
            Some(Arc::new(move |_: &ProgressSnapshot| {
                cb_emissions.fetch_add(1, Ordering::SeqCst);
            })),
            60_000,
        )
        .unwrap();

        tracker.increment(None); // throttled: first emission always happens (no prior emit)
        tracker.increment(None); // final item: always emits regardless of throttle
        assert_eq!(emissions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn throttled_increments_in_the_middle_are_skipped() {
        let emissions = Arc::new(AtomicUsize::new(0));
        let cb_emissions = emissions.clone();
        let tracker = ProgressTracker::new(
            "u1",
            3106,
            "Processing frame",
            Some(Arc::new(move |_: &ProgressSnapshot| {
                cb_emissions.fetch_add(1, Ordering::SeqCst);
            })),
            60_000,
        )
        .unwrap();

        for _ in 0..500 {
            tracker.increment(None);
        }
        // First increment always emits (no previous emission timestamp);
        // the other 499 fall inside the 60s throttle window.
        assert_eq!(emissions.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.format_subtask(), "Processing frame 500/3106 (16%)");
    }

    #[test]
    fn set_total_items_rejects_below_completed() {
        let tracker = ProgressTracker::new("u1", 10, "phase", None, 0).unwrap();
        tracker.increment(None);
        tracker.increment(None);
        assert!(tracker.set_total_items(1).is_err());
        assert!(tracker.set_total_items(5).is_ok());
    }

    #[test]
    fn concurrent_increments_never_exceed_total() {
        let tracker = Arc::new(ProgressTracker::new("u1", 100, "phase", None, 0).unwrap());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let tracker = tracker.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..20 {
                    tracker.increment(None);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.snapshot().completed, 100);
    }

    #[test]
    fn reset_clears_counters_and_emission_history() {
        let tracker = ProgressTracker::new("u1", 5, "phase", None, 0).unwrap();
        tracker.increment(Some("frame-1".to_string()));
        tracker.reset();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 0);
        assert!(snapshot.last_item_label.is_none());
    }
}
