use std::borrow::Borrow;

use acctrun_core::{EventKind, RunEvent};
use tracing::{debug, error, info, info_span, trace, warn};
use uuid::Uuid;

pub trait View {
    fn run_id(&self) -> Uuid;
    fn as_account(&self) -> &str;
    fn as_reason(&self) -> &str;
    fn index(&self) -> usize;
    fn attempt(&self) -> u32;
    fn delay_ms(&self) -> u64;
    fn timeout_ms(&self) -> u64;
    fn kind(&self) -> EventKind;
    fn has_reason(&self) -> bool;
}

impl<T> View for T
where
    T: Borrow<RunEvent>,
{
    #[inline]
    fn run_id(&self) -> Uuid {
        self.borrow().run_id
    }
    #[inline]
    fn as_account(&self) -> &str {
        self.borrow().account.as_ref().map(|a| a.as_str()).unwrap_or("unknown")
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn index(&self) -> usize {
        self.borrow().index.unwrap_or(0)
    }
    #[inline]
    fn attempt(&self) -> u32 {
        self.borrow().attempt.unwrap_or(0)
    }
    #[inline]
    fn delay_ms(&self) -> u64 {
        self.borrow().delay_ms.unwrap_or(0)
    }
    #[inline]
    fn timeout_ms(&self) -> u64 {
        self.borrow().timeout_ms.unwrap_or(0)
    }
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
    #[inline]
    fn has_reason(&self) -> bool {
        self.borrow().reason.is_some()
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // run
        EventKind::RunStarted => "run started",
        EventKind::RunDraining => "all accounts dispatched; waiting for in-flight tasks",
        EventKind::RunCompleted => "run completed",

        // shutdown
        EventKind::CancelRequested => "cancellation requested; pending accounts will not start",
        EventKind::OverallTimeoutHit => "overall run timeout hit",
        EventKind::GraceExceeded => "grace exceeded; some tasks did not stop in time",
        EventKind::AllStoppedWithinGrace => "all tasks stopped within grace period",

        // lifecycle
        EventKind::TaskStarting => "task is starting",
        EventKind::BackoffScheduled => "credential retry scheduled",
        EventKind::CredentialsAcquired => "credentials acquired",
        EventKind::TaskExecuting => "command executing",
        EventKind::TaskSucceeded => "task succeeded",
        EventKind::TaskFailed => "task failed",
        EventKind::TaskTimedOut => "task exceeded its configured timeout",
        EventKind::TaskCancelled => "task cancelled",

        // hooks
        EventKind::HookFailed => "command hook failed",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());
    // subscriber workers run outside the run's span; restore the run id on every line
    let span = info_span!("run", id = %e.run_id());
    let _entered = span.enter();

    match e.kind() {
        // run
        EventKind::RunStarted => info!(reason = e.as_reason(), "{msg}"),
        EventKind::RunDraining => debug!("{msg}"),
        EventKind::RunCompleted => info!(reason = e.as_reason(), "{msg}"),

        // shutdown
        EventKind::CancelRequested => info!("{msg}"),
        EventKind::OverallTimeoutHit => warn!(timeout_ms = e.timeout_ms(), "{msg}"),
        EventKind::AllStoppedWithinGrace => info!("{msg}"),
        EventKind::GraceExceeded => warn!(grace_ms = e.timeout_ms(), reason = e.as_reason(), "{msg}"),

        // lifecycle
        EventKind::TaskStarting => debug!(account = e.as_account(), index = e.index(), "{msg}"),
        EventKind::BackoffScheduled => {
            if e.has_reason() {
                debug!(
                    account = e.as_account(),
                    attempt = e.attempt(),
                    delay_ms = e.delay_ms(),
                    reason = e.as_reason(),
                    "retry scheduled after failure",
                );
            } else {
                debug!(
                    account = e.as_account(),
                    attempt = e.attempt(),
                    delay_ms = e.delay_ms(),
                    "{msg}",
                );
            }
        }
        EventKind::CredentialsAcquired => trace!(account = e.as_account(), attempt = e.attempt(), "{msg}"),
        EventKind::TaskExecuting => trace!(account = e.as_account(), "{msg}"),
        EventKind::TaskSucceeded => info!(account = e.as_account(), attempt = e.attempt(), "{msg}"),
        EventKind::TaskFailed => error!(
            account = e.as_account(),
            attempt = e.attempt(),
            reason = e.as_reason(),
            "{msg}"
        ),
        EventKind::TaskTimedOut => {
            warn!(account = e.as_account(), timeout_ms = e.timeout_ms(), "{msg}")
        }
        EventKind::TaskCancelled => debug!(account = e.as_account(), reason = e.as_reason(), "{msg}"),

        // hooks
        EventKind::HookFailed => error!(reason = e.as_reason(), "{msg}"),
    }
}
