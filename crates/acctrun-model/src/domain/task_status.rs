use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one per-account task.
///
/// A task only moves forward:
/// `Pending → AcquiringCredentials → Executing → {Succeeded | Failed | Cancelled | TimedOut}`.
/// `Pending` may jump straight to `Cancelled` when a run is aborted before the task was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Task is queued and waiting for a worker.
    Pending,
    /// Worker is obtaining a session from the credential provider.
    AcquiringCredentials,
    /// Command is running against the account.
    Executing,
    /// Command returned a value.
    Succeeded,
    /// Credential acquisition or the command failed.
    Failed,
    /// Task was cancelled before or during execution.
    Cancelled,
    /// Task exceeded its per-account deadline.
    TimedOut,
}

impl TaskStatus {
    /// Returns `true` if the task is in a terminal state (won't transition further).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::TimedOut
        )
    }

    /// Returns `true` if the task is still active (pending or in flight).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns `true` if a worker currently owns the task.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TaskStatus::AcquiringCredentials | TaskStatus::Executing)
    }

    /// Returns `true` if moving from `self` to `next` follows the task state machine.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match self {
            Pending => matches!(next, AcquiringCredentials | Cancelled),
            AcquiringCredentials => matches!(next, Executing | Failed | Cancelled | TimedOut),
            Executing => matches!(next, Succeeded | Failed | Cancelled | TimedOut),
            Succeeded | Failed | Cancelled | TimedOut => false,
        }
    }

    /// Short lowercase label used in logs and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::AcquiringCredentials => "acquiring-credentials",
            TaskStatus::Executing => "executing",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::TimedOut => "timed-out",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
