use std::fmt;

/// Kinds of [`super::RunEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // run lifecycle
    RunStarted,
    /// Every task was dispatched or cancelled; waiting for in-flight ones.
    RunDraining,
    RunCompleted,

    // shutdown
    CancelRequested,
    OverallTimeoutHit,
    GraceExceeded,
    AllStoppedWithinGrace,

    // task lifecycle
    TaskStarting,
    BackoffScheduled,
    CredentialsAcquired,
    TaskExecuting,
    TaskSucceeded,
    TaskFailed,
    TaskTimedOut,
    TaskCancelled,

    // hooks
    HookFailed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "run-started",
            EventKind::RunDraining => "run-draining",
            EventKind::RunCompleted => "run-completed",
            EventKind::CancelRequested => "cancel-requested",
            EventKind::OverallTimeoutHit => "overall-timeout-hit",
            EventKind::GraceExceeded => "grace-exceeded",
            EventKind::AllStoppedWithinGrace => "all-stopped-within-grace",
            EventKind::TaskStarting => "task-starting",
            EventKind::BackoffScheduled => "backoff-scheduled",
            EventKind::CredentialsAcquired => "credentials-acquired",
            EventKind::TaskExecuting => "task-executing",
            EventKind::TaskSucceeded => "task-succeeded",
            EventKind::TaskFailed => "task-failed",
            EventKind::TaskTimedOut => "task-timed-out",
            EventKind::TaskCancelled => "task-cancelled",
            EventKind::HookFailed => "hook-failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
