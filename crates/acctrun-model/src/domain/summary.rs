use serde::{Deserialize, Serialize};

use crate::{Outcome, TaskStatus};

/// Counts of terminal outcomes in a finished run.
///
/// "The run completed" and "every account succeeded" are different facts: a run that completes with failures still has a summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub timed_out: usize,
}

impl RunSummary {
    pub fn from_outcomes<T>(outcomes: &[Outcome<T>]) -> Self {
        let mut summary = RunSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.status() {
                TaskStatus::Succeeded => summary.succeeded += 1,
                TaskStatus::Cancelled => summary.cancelled += 1,
                TaskStatus::TimedOut => summary.timed_out += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    /// Number of accounts that did not succeed for any reason.
    pub fn unsuccessful(&self) -> usize {
        self.failed + self.cancelled + self.timed_out
    }
}
