use std::{
    future::pending,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use acctrun_creds::CredentialProvider;
use acctrun_model::{Account, AccountId, Outcome, RunPhase, TaskError, TaskStatus};

use super::{ReorderBuffer, RunReport, worker};
use crate::{
    Command, RunOptions, RunState, StreamOrder,
    event::{Bus, EventKind, RunEvent},
    runner::worker::Shared,
};

/// Owns one run from first dispatch to the final report.
pub(crate) struct Driver<C: Command> {
    pub(crate) run_id: Uuid,
    pub(crate) command: Arc<C>,
    pub(crate) provider: Arc<dyn CredentialProvider>,
    pub(crate) options: RunOptions,
    pub(crate) concurrency: usize,
    pub(crate) accounts: Vec<Arc<Account>>,
    pub(crate) state: RunState,
    pub(crate) bus: Bus,
    pub(crate) bus_workers: Vec<JoinHandle<()>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) stream: mpsc::UnboundedSender<Outcome<C::Output>>,
}

impl<C: Command> Driver<C> {
    pub(crate) async fn drive(self) -> RunReport<C::Output> {
        let started = Instant::now();
        let total = self.accounts.len();

        self.state.set_phase(RunPhase::Running);
        self.bus.publish(
            RunEvent::new(EventKind::RunStarted)
                .with_reason(format!("{} account(s), concurrency {}", total, self.concurrency)),
        );
        info!(accounts = total, concurrency = self.concurrency, "run started");

        let done = CancellationToken::new();
        let watchdog = tokio::spawn(watchdog(
            self.cancel.clone(),
            done.clone(),
            self.options.overall_timeout(),
            self.options.grace(),
            self.bus.clone(),
            self.state.clone(),
        )
        .in_current_span());

        let (tx, rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(collect(
            Arc::clone(&self.command),
            rx,
            self.stream,
            self.accounts.iter().map(|a| a.id.clone()).collect(),
            self.options.stream_order,
        )
        .in_current_span());

        let shared = Arc::new(Shared {
            command: Arc::clone(&self.command),
            provider: self.provider,
            options: self.options,
            state: self.state.clone(),
            bus: self.bus.clone(),
            cancel: self.cancel.clone(),
            results: tx,
        });

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut dispatched = 0;
        while dispatched < total {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let account = Arc::clone(&self.accounts[dispatched]);
            tokio::spawn(worker::process(Arc::clone(&shared), dispatched, account, permit).in_current_span());
            dispatched += 1;
        }

        if dispatched < total {
            debug!(pending = total - dispatched, "cancelling undispatched accounts");
        }
        for (index, account) in self.accounts.iter().enumerate().skip(dispatched) {
            shared.skip(index, &account.id);
        }
        drop(shared);

        self.state.set_phase(RunPhase::Draining);
        self.bus.publish(RunEvent::new(EventKind::RunDraining));

        let outcomes = match collector.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!(error = %e, "outcome collector failed");
                Vec::new()
            }
        };

        done.cancel();
        if let Err(e) = watchdog.await {
            warn!(error = %e, "run watchdog failed");
        }

        if let Err(e) = self.command.post_hook(&outcomes).await {
            let reason = format!("{e:#}");
            warn!(command = self.command.name(), error = %reason, "post-hook failed");
            self.bus
                .publish(RunEvent::new(EventKind::HookFailed).with_reason(format!("post-hook: {reason}")));
        }

        self.state.set_phase(RunPhase::Completed);
        // the token alone can be set by a watchdog firing after the last outcome arrived
        let cancelled = outcomes.iter().any(|o| o.status() == TaskStatus::Cancelled);
        let report = RunReport::new(
            self.run_id,
            self.command.name().to_string(),
            started.elapsed(),
            cancelled,
            outcomes,
        );
        self.bus.publish(RunEvent::new(EventKind::RunCompleted).with_reason(format!(
            "{} succeeded, {} failed, {} cancelled, {} timed out",
            report.summary.succeeded, report.summary.failed, report.summary.cancelled, report.summary.timed_out
        )));
        info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            succeeded = report.summary.succeeded,
            total = report.summary.total,
            "run completed"
        );

        drop(self.bus);
        for w in self.bus_workers {
            if let Err(e) = w.await {
                warn!(error = %e, "subscriber worker failed");
            }
        }
        report
    }
}

/// Gather outcomes into selection order, forwarding each one to the stream as it becomes available.
async fn collect<C: Command>(
    command: Arc<C>,
    mut rx: mpsc::UnboundedReceiver<Outcome<C::Output>>,
    stream: mpsc::UnboundedSender<Outcome<C::Output>>,
    ids: Vec<AccountId>,
    order: StreamOrder,
) -> Vec<Outcome<C::Output>> {
    let mut slots: Vec<Option<Outcome<C::Output>>> = ids.iter().map(|_| None).collect();
    let mut reorder = ReorderBuffer::new();

    while let Some(outcome) = rx.recv().await {
        let index = outcome.index;
        match slots.get(index) {
            Some(None) => {}
            Some(Some(_)) => {
                warn!(account = %outcome.account, index, "duplicate outcome ignored");
                continue;
            }
            None => {
                warn!(account = %outcome.account, index, "outcome for unknown task ignored");
                continue;
            }
        }

        if catch_unwind(AssertUnwindSafe(|| command.on_outcome(&outcome))).is_err() {
            error!(account = %outcome.account, "on_outcome panicked");
        }
        slots[index] = Some(outcome.clone());

        let ready = match order {
            StreamOrder::Completion => vec![outcome],
            StreamOrder::Selection => reorder.push(index, outcome),
        };
        for outcome in ready {
            // the caller may have stopped reading; the report still gets everything
            let _ = stream.send(outcome);
        }
    }

    slots
        .into_iter()
        .zip(ids)
        .enumerate()
        .map(|(index, (slot, id))| {
            slot.unwrap_or_else(|| {
                error!(account = %id, index, "task finished without an outcome");
                Outcome::failure(
                    id,
                    index,
                    TaskError::Command {
                        reason: "task finished without an outcome".into(),
                    },
                )
            })
        })
        .collect()
}

/// Fires the overall timeout and reports whether in-flight tasks stopped within the grace period after cancellation.
async fn watchdog(
    cancel: CancellationToken,
    done: CancellationToken,
    overall: Option<Duration>,
    grace: Duration,
    bus: Bus,
    state: RunState,
) {
    let deadline = async {
        match overall {
            Some(limit) => tokio::time::sleep(limit).await,
            None => pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = done.cancelled() => return,
        _ = cancel.cancelled() => {
            info!("cancellation requested");
            bus.publish(RunEvent::new(EventKind::CancelRequested));
        }
        _ = deadline => {
            let timeout_ms = overall.map(|d| d.as_millis() as u64).unwrap_or_default();
            warn!(timeout_ms, "overall run timeout hit, cancelling");
            bus.publish(RunEvent::new(EventKind::OverallTimeoutHit).with_timeout_ms(timeout_ms));
            cancel.cancel();
        }
    }

    tokio::select! {
        biased;
        _ = done.cancelled() => bus.publish(RunEvent::new(EventKind::AllStoppedWithinGrace)),
        _ = tokio::time::sleep(grace) => {
            let in_flight = state.in_flight();
            warn!(in_flight, grace_ms = grace.as_millis() as u64, "grace exceeded; tasks still running");
            bus.publish(
                RunEvent::new(EventKind::GraceExceeded)
                    .with_timeout_ms(grace.as_millis() as u64)
                    .with_reason(format!("{in_flight} task(s) still running")),
            );
        }
    }
}
