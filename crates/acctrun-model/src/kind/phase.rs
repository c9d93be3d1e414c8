use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a whole run.
///
/// `Idle → Running → Draining → Completed`. `Draining` is entered on cancellation or overall timeout: no new tasks are dispatched, in-flight ones are awaited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Draining,
    Completed,
}

impl RunPhase {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunPhase::Completed)
    }

    /// Phases only advance; this returns `false` for any backward or repeated move.
    pub fn can_advance_to(&self, next: RunPhase) -> bool {
        (next as u8) > (*self as u8)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Draining => "draining",
            RunPhase::Completed => "completed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
