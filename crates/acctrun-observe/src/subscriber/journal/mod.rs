use async_trait::async_trait;

use acctrun_core::{EventKind, RunEvent, Subscribe};

use crate::subscriber::view::log_event;

const DEFAULT_QUEUE: usize = 2048;

/// Writes run events to the tracing log.
///
/// By default every event is logged. [`Journal::summary_only`] keeps run-level events
/// plus per-account failures and timeouts, which is what a large fan-out usually wants.
#[derive(Debug, Clone)]
pub struct Journal {
    summary_only: bool,
    queue_capacity: usize,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            summary_only: false,
            queue_capacity: DEFAULT_QUEUE,
        }
    }

    pub fn summary_only() -> Self {
        Self {
            summary_only: true,
            ..Self::new()
        }
    }

    /// Events queued for this journal before new ones are dropped.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Whether `kind` is written by this journal.
    pub fn records(&self, kind: EventKind) -> bool {
        !self.summary_only || !is_progress(kind)
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-account steps that say nothing about the result.
fn is_progress(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::TaskStarting
            | EventKind::BackoffScheduled
            | EventKind::CredentialsAcquired
            | EventKind::TaskExecuting
            | EventKind::TaskSucceeded
            | EventKind::TaskCancelled
    )
}

#[async_trait]
impl Subscribe for Journal {
    async fn on_event(&self, event: &RunEvent) {
        if self.records(event.kind) {
            log_event(event);
        }
    }
    fn name(&self) -> &'static str {
        "journal"
    }
    fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_only_keeps_run_events_and_problems() {
        let journal = Journal::summary_only();
        for kind in [
            EventKind::RunStarted,
            EventKind::RunCompleted,
            EventKind::GraceExceeded,
            EventKind::TaskFailed,
            EventKind::TaskTimedOut,
            EventKind::HookFailed,
        ] {
            assert!(journal.records(kind), "{kind}");
        }
        for kind in [EventKind::TaskStarting, EventKind::TaskSucceeded, EventKind::BackoffScheduled] {
            assert!(!journal.records(kind), "{kind}");
        }
        assert!(Journal::new().records(EventKind::TaskExecuting));
    }

    #[test]
    fn queue_capacity_is_at_least_one() {
        assert_eq!(Journal::new().queue_capacity(), 2048);
        assert_eq!(Journal::summary_only().with_queue_capacity(0).queue_capacity(), 1);
    }
}
