//! Dual-stage progress tracking with throughput-based ETA.
//!
//! A [`BatchProgress`] is created and owned by the caller of
//! `submit_batch`; the orchestrator only ever mutates it through
//! [`StageProgress::advance`], keeping all updates behind one synchronized
//! path. Counters are monotonically non-decreasing within a stage and
//! reset only between batch submissions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Length of the trailing window used for throughput estimation.
const RATE_WINDOW: Duration = Duration::from_secs(10);

/// Point-in-time view of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSnapshot {
    pub current: u64,
    pub total: u64,
    pub bytes_done: u64,
    pub bytes_total: u64,
    /// Trailing-window throughput in bytes per second.
    pub bytes_per_sec: f64,
    /// Projected time remaining; `None` until throughput is measurable.
    pub eta: Option<Duration>,
}

#[derive(Debug, Default)]
struct StageState {
    current: u64,
    total: u64,
    bytes_done: u64,
    bytes_total: u64,
    samples: VecDeque<(Instant, u64)>,
}

/// Progress counter for a single stage (normalize or transfer).
#[derive(Clone, Default)]
pub struct StageProgress {
    state: Arc<Mutex<StageState>>,
}

impl StageProgress {
    /// Set the stage's totals, clearing prior counts. Called once when the
    /// stage's work set is known.
    pub fn set_total(&self, items: u64, bytes: u64) {
        let mut state = self.state.lock().unwrap();
        *state = StageState {
            total: items,
            bytes_total: bytes,
            ..StageState::default()
        };
    }

    /// Record completed work. Completion order of the underlying items is
    /// irrelevant; counts only move forward.
    pub fn advance(&self, items: u64, bytes: u64) {
        let mut state = self.state.lock().unwrap();
        state.current += items;
        state.bytes_done += bytes;
        let now = Instant::now();
        state.samples.push_back((now, bytes));
        while let Some(&(t, _)) = state.samples.front() {
            if now.duration_since(t) > RATE_WINDOW {
                state.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn snapshot(&self) -> StageSnapshot {
        let state = self.state.lock().unwrap();
        let now = Instant::now();
        let windowed: u64 = state
            .samples
            .iter()
            .filter(|(t, _)| now.duration_since(*t) <= RATE_WINDOW)
            .map(|(_, b)| *b)
            .sum();

        let elapsed = state
            .samples
            .front()
            .map(|(t, _)| now.duration_since(*t))
            .unwrap_or(Duration::ZERO);

        let bytes_per_sec = if elapsed > Duration::ZERO {
            windowed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let remaining = state.bytes_total.saturating_sub(state.bytes_done);
        let eta = if bytes_per_sec > 0.0 && remaining > 0 {
            Some(Duration::from_secs_f64(remaining as f64 / bytes_per_sec))
        } else {
            None
        };

        StageSnapshot {
            current: state.current,
            total: state.total,
            bytes_done: state.bytes_done,
            bytes_total: state.bytes_total,
            bytes_per_sec,
            eta,
        }
    }
}

/// Caller-owned progress context for one batch submission.
#[derive(Clone, Default)]
pub struct BatchProgress {
    pub normalize: StageProgress,
    pub transfer: StageProgress,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both stages. The orchestrator calls this at the start of each
    /// batch; counters never move backwards within one submission.
    pub fn reset(&self) {
        self.normalize.set_total(0, 0);
        self.transfer.set_total(0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let stage = StageProgress::default();
        stage.set_total(3, 300);

        stage.advance(1, 100);
        let first = stage.snapshot();
        stage.advance(1, 100);
        let second = stage.snapshot();

        assert!(second.current >= first.current);
        assert!(second.bytes_done >= first.bytes_done);
        assert_eq!(second.current, 2);
        assert_eq!(second.total, 3);
    }

    #[test]
    fn set_total_resets_counts() {
        let stage = StageProgress::default();
        stage.set_total(2, 20);
        stage.advance(2, 20);
        stage.set_total(5, 50);

        let snap = stage.snapshot();
        assert_eq!(snap.current, 0);
        assert_eq!(snap.total, 5);
        assert_eq!(snap.bytes_done, 0);
    }

    #[test]
    fn eta_appears_once_rate_is_measurable() {
        let stage = StageProgress::default();
        stage.set_total(10, 1000);
        assert!(stage.snapshot().eta.is_none());

        stage.advance(1, 100);
        std::thread::sleep(Duration::from_millis(20));
        stage.advance(1, 100);

        let snap = stage.snapshot();
        assert!(snap.bytes_per_sec > 0.0);
        assert!(snap.eta.is_some());
    }
}
