//! Per-item results and run summaries

use crate::graph::{MutationKind, Username};
use crate::integrations::{FailureReason, MutationOutcome};
use std::time::Duration;

/// Outcome of one mutation in a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub username: Username,
    pub kind: MutationKind,
    pub outcome: MutationOutcome,
}

impl MutationResult {
    pub fn new(username: Username, kind: MutationKind, outcome: MutationOutcome) -> Self {
        Self {
            username,
            kind,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match &self.outcome {
            MutationOutcome::Success => None,
            MutationOutcome::Failure(reason) => Some(reason),
        }
    }
}

/// Aggregate of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Candidates never dispatched because the run was interrupted
    pub skipped: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
    /// Every dispatched item, in completion order
    pub results: Vec<MutationResult>,
}

impl BatchReport {
    pub(crate) fn push(&mut self, result: MutationResult) {
        self.attempted += 1;
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Items per second over the whole run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempted as f64 / secs
        } else {
            0.0
        }
    }

    /// Percentage of attempted items that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 * 100.0 / self.attempted as f64
        }
    }

    /// Every candidate was attempted and none failed
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    pub fn failures(&self) -> impl Iterator<Item = &MutationResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}
