//! Build progress.
//!
//! The build worker is the only writer; any thread may read a
//! [`ProgressSnapshot`] at any time.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Receives progress from the build worker.
pub trait ProgressSink: Send + Sync {
    /// Number of units this build will compile.
    fn set_total(&self, total: usize);

    /// One more unit finished; `label` is its qualified type name.
    fn advance(&self, label: &str);
}

impl ProgressSink for () {
    fn set_total(&self, _total: usize) {}

    fn advance(&self, _label: &str) {}
}

/// Progress counters shared with a reader.
#[derive(Debug, Default)]
pub struct ProgressState {
    total: AtomicUsize,
    completed: AtomicUsize,
    label: Mutex<Option<String>>,
}

/// Point-in-time copy of a [`ProgressState`].
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    /// Last unit reported.
    pub label: Option<String>,
}

impl ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`; zero when nothing is planned.
    #[expect(
        clippy::cast_precision_loss,
        reason = "unit counts are far below f64 precision limits"
    )]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed.min(self.total) as f64) / (self.total as f64)
        }
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            label: self.label.lock().clone(),
        }
    }
}

impl ProgressSink for ProgressState {
    /// Starts a new build: the completed count goes back to zero.
    fn set_total(&self, total: usize) {
        self.completed.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
        *self.label.lock() = None;
    }

    fn advance(&self, label: &str) {
        *self.label.lock() = Some(label.to_string());
        self.completed.fetch_add(1, Ordering::AcqRel);
    }
}
