//! Progress tracking for batch runs.

use instant::Instant;
use serde::{Deserialize, Serialize};

/// Running totals of a batch job.
#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    /// Items handled so far, whatever their outcome
    pub items_completed: usize,
    /// Items the run intends to handle
    pub items_total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Time elapsed since the run started (milliseconds)
    pub elapsed_ms: u64,
}

impl BatchProgress {
    pub fn new(items_total: usize) -> Self {
        Self {
            items_total,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
        self.items_completed += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
        self.items_completed += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
        self.items_completed += 1;
    }

    /// Completion percentage (0.0 to 100.0).
    pub fn percent_complete(&self) -> f64 {
        if self.items_total == 0 {
            0.0
        } else {
            (self.items_completed as f64 / self.items_total as f64) * 100.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.items_completed >= self.items_total
    }

    /// Estimated time remaining in milliseconds, if computable.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        if self.items_completed == 0 || self.items_completed >= self.items_total {
            return None;
        }
        let remaining = self.items_total - self.items_completed;
        let ms_per_item = self.elapsed_ms / self.items_completed as u64;
        Some(remaining as u64 * ms_per_item)
    }

    /// Final report of the run.
    pub fn report(&self) -> BatchRunReport {
        BatchRunReport {
            processed: self.items_completed,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Outcome of one batch job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRunReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_ms: u64,
}

impl BatchRunReport {
    /// Folds another run's counts into this one.
    pub fn merge(&mut self, other: &BatchRunReport) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.elapsed_ms += other.elapsed_ms;
    }
}

/// Helper for tracking elapsed time during processing.
pub struct ProgressTimer {
    start: Instant,
}

impl ProgressTimer {
    /// Creates a new timer starting now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for ProgressTimer {
    fn default() -> Self {
        Self::new()
    }
}
