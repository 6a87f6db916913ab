//! Counters and events the pool emits for a presentation layer.
//!
//! Consumers receive [`PoolEvent`]s over a `std::sync::mpsc` channel; the pool
//! itself never prints.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::download::DownloadOutcome;
use crate::job::Job;

/// Jobs processed so far out of jobs enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStats {
    pub done: u64,
    pub total: u64,
}

impl ProgressStats {
    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.done as f64 / self.total as f64).min(1.0)
    }
}

/// Per-run outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub completed: u64,
    pub failed: u64,
    /// Jobs found already done in the history when dequeued.
    pub skipped: u64,
}

impl PoolStats {
    pub fn processed(&self) -> u64 {
        self.completed + self.failed + self.skipped
    }
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Something observable happened in the pool.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    Completed { job: Job, outcome: DownloadOutcome },
    /// The job was already in the history.
    Skipped { job: Job },
    /// The download failed; the job stays unmarked for a future run.
    Failed { job: Job, error: String },
    Progress(ProgressStats),
    /// The scaler changed the live worker count.
    Scaled { live: usize, cpu: f32 },
}
