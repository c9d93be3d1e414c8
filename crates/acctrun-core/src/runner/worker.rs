use std::{any::Any, sync::Arc, time::Duration};

use tokio::{
    sync::{OwnedSemaphorePermit, mpsc},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, trace};

use acctrun_creds::{CredentialError, CredentialProvider, Session};
use acctrun_model::{Account, AccountId, Failure, Outcome, TaskError, TaskIndex, TaskStatus};

use crate::{
    Command, ExecContext, RunOptions, RunState,
    event::{Bus, EventKind, RunEvent},
};

/// What every worker of one run shares.
///
/// The outcome sender lives here, so the collector ends once the driver and all workers dropped their handle.
pub(crate) struct Shared<C: Command> {
    pub(crate) command: Arc<C>,
    pub(crate) provider: Arc<dyn CredentialProvider>,
    pub(crate) options: RunOptions,
    pub(crate) state: RunState,
    pub(crate) bus: Bus,
    pub(crate) cancel: CancellationToken,
    pub(crate) results: mpsc::UnboundedSender<Outcome<C::Output>>,
}

impl<C: Command> Shared<C> {
    /// Record an outcome for a task that was never dispatched.
    pub(crate) fn skip(&self, index: TaskIndex, account: &AccountId) {
        let outcome = Outcome::cancelled(account.clone(), index);
        self.report(outcome, Some("cancelled before dispatch".to_string()));
    }

    fn finish(
        &self,
        index: TaskIndex,
        account: &AccountId,
        started: Instant,
        attempts: u32,
        result: Result<C::Output, TaskError>,
    ) {
        let outcome = Outcome {
            account: account.clone(),
            index,
            elapsed: started.elapsed(),
            attempts,
            result: result.map_err(Failure::new),
        };
        let reason = outcome.failure_ref().map(|f| f.to_string());
        self.report(outcome, reason);
    }

    fn report(&self, outcome: Outcome<C::Output>, reason: Option<String>) {
        let status = outcome.status();
        self.state.update_status(outcome.index, status, reason.clone());

        let kind = match status {
            TaskStatus::Succeeded => EventKind::TaskSucceeded,
            TaskStatus::TimedOut => EventKind::TaskTimedOut,
            TaskStatus::Cancelled => EventKind::TaskCancelled,
            _ => EventKind::TaskFailed,
        };
        let mut event = RunEvent::new(kind)
            .with_task(&outcome.account, outcome.index)
            .with_attempt(outcome.attempts);
        if let Some(reason) = reason {
            event = event.with_reason(reason);
        }
        if let Some(Failure {
            error: TaskError::Timeout { timeout_ms },
            ..
        }) = outcome.failure_ref()
        {
            event = event.with_timeout_ms(*timeout_ms);
        }
        self.bus.publish(event);

        if self.results.send(outcome).is_err() {
            debug!("outcome collector is gone");
        }
    }

    /// Acquire a session, retrying transient faults with backoff.
    ///
    /// Returns the number of attempts made alongside the session or the terminal error.
    async fn acquire(&self, index: TaskIndex, account: &AccountId) -> Result<(Session, u32), (TaskError, u32)> {
        let policy = &self.options.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.state.increment_attempt(index);

            let err = match self.provider.acquire(account).await {
                Ok(session) if session.account() == account => {
                    self.bus.publish(
                        RunEvent::new(EventKind::CredentialsAcquired)
                            .with_task(account, index)
                            .with_attempt(attempt),
                    );
                    return Ok((session, attempt));
                }
                Ok(session) => CredentialError::auth_failure(format!(
                    "provider returned a session for account {}",
                    session.account()
                )),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= max_attempts {
                return Err((err.into(), attempt));
            }

            let delay = policy.delay_for(attempt);
            self.bus.publish(
                RunEvent::new(EventKind::BackoffScheduled)
                    .with_task(account, index)
                    .with_attempt(attempt)
                    .with_delay_ms(delay.as_millis() as u64)
                    .with_reason(err.to_string()),
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err((TaskError::Cancelled, attempt)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Run one account: credentials, then the command, then exactly one outcome.
///
/// The permit moves into the command's own task, so a timed-out command keeps its slot until it really ends.
pub(crate) async fn process<C: Command>(
    shared: Arc<Shared<C>>,
    index: TaskIndex,
    account: Arc<Account>,
    permit: OwnedSemaphorePermit,
) {
    let started = Instant::now();
    let id = account.id.clone();

    shared.state.update_status(index, TaskStatus::AcquiringCredentials, None);
    shared
        .bus
        .publish(RunEvent::new(EventKind::TaskStarting).with_task(&id, index));

    let (session, attempts) = match shared.acquire(index, &id).await {
        Ok(acquired) => acquired,
        Err((error, attempts)) => return shared.finish(index, &id, started, attempts, Err(error)),
    };

    if shared.cancel.is_cancelled() {
        return shared.finish(index, &id, started, attempts, Err(TaskError::Cancelled));
    }

    shared.state.update_status(index, TaskStatus::Executing, None);
    shared
        .bus
        .publish(RunEvent::new(EventKind::TaskExecuting).with_task(&id, index));

    let token = shared.cancel.child_token();
    let ctx = ExecContext::new(session, account, index, token.clone());
    let command = Arc::clone(&shared.command);
    let exec = tokio::spawn(
        async move {
            let _permit = permit;
            command.execute(ctx).await
        }
        .instrument(tracing::debug_span!("account", id = %id)),
    );

    let joined = match shared.options.per_account_timeout() {
        Some(limit) => match tokio::time::timeout(limit, exec).await {
            Ok(joined) => joined,
            Err(_) => {
                token.cancel();
                trace!(account = %id, "command left running past its deadline");
                let timeout_ms = duration_ms(limit);
                return shared.finish(index, &id, started, attempts, Err(TaskError::Timeout { timeout_ms }));
            }
        },
        None => exec.await,
    };

    let result = match joined {
        Ok(Ok(value)) => Ok(value),
        // only an acknowledged stop counts; other errors after a cancel are real failures
        Ok(Err(e)) if e.is_cancelled() && token.is_cancelled() => {
            debug!(account = %id, "command stopped after cancellation");
            Err(TaskError::Cancelled)
        }
        Ok(Err(e)) => Err(TaskError::Command {
            reason: format!("{e:#}"),
        }),
        Err(e) if e.is_panic() => Err(TaskError::Command {
            reason: format!("command panicked: {}", panic_message(e.into_panic())),
        }),
        Err(_) => Err(TaskError::Cancelled),
    };
    shared.finish(index, &id, started, attempts, result);
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
