use std::{sync::Arc, time::Duration};

use serde::{Serialize, Serializer};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, instrument};
use uuid::Uuid;

use acctrun_creds::CredentialProvider;
use acctrun_model::{Account, Outcome, RunPhase, RunSummary, TaskInfo};
use acctrun_select::{AccountSource, SelectionCriteria, select};

use crate::{Command, RunError, RunOptions, RunState, Subscribe, event::Bus};

mod driver;
use driver::Driver;

mod reorder;
pub use reorder::ReorderBuffer;

mod worker;

/// Drives a command across selected accounts on a bounded pool.
///
/// ```ignore
/// let runner = Runner::new(provider).with_options(RunOptions::default().with_max_concurrency(4));
/// let report = runner.run(Arc::new(cmd), &criteria, &pool).await?;
/// std::process::exit(report.exit_code());
/// ```
pub struct Runner {
    provider: Arc<dyn CredentialProvider>,
    options: RunOptions,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Runner {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            options: RunOptions::default(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Select accounts from `pool` and run to completion; outcomes come back in selection order.
    pub async fn run<C: Command>(
        &self,
        command: Arc<C>,
        criteria: &SelectionCriteria,
        pool: &[Account],
    ) -> Result<RunReport<C::Output>, RunError> {
        self.start(command, criteria, pool).await?.finish().await
    }

    /// Like [`Runner::run`], loading the pool from `source` first.
    pub async fn run_source<C: Command>(
        &self,
        command: Arc<C>,
        criteria: &SelectionCriteria,
        source: &dyn AccountSource,
    ) -> Result<RunReport<C::Output>, RunError> {
        let pool = source.load_pool().await?;
        debug!(source = source.name(), accounts = pool.len(), "pool loaded");
        self.run(command, criteria, &pool).await
    }

    /// Run an already selected list of accounts.
    pub async fn run_accounts<C: Command>(
        &self,
        command: Arc<C>,
        accounts: Vec<Account>,
    ) -> Result<RunReport<C::Output>, RunError> {
        self.start_accounts(command, accounts).await?.finish().await
    }

    /// Select accounts and start the run, returning a handle that streams outcomes.
    ///
    /// Every fatal problem (bad options, invalid arguments, unknown ids, bad predicates, provider misconfiguration, failing pre-hook) is reported here, before any account is dispatched.
    #[instrument(level = "debug", skip_all, fields(command = command.name()))]
    pub async fn start<C: Command>(
        &self,
        command: Arc<C>,
        criteria: &SelectionCriteria,
        pool: &[Account],
    ) -> Result<RunHandle<C::Output>, RunError> {
        self.options.validate()?;
        command
            .validate()
            .map_err(|e| RunError::InvalidArguments(format!("{e:#}")))?;
        let accounts = select(pool, criteria)?;
        self.launch(command, accounts).await
    }

    pub async fn start_accounts<C: Command>(
        &self,
        command: Arc<C>,
        accounts: Vec<Account>,
    ) -> Result<RunHandle<C::Output>, RunError> {
        self.options.validate()?;
        command
            .validate()
            .map_err(|e| RunError::InvalidArguments(format!("{e:#}")))?;
        self.launch(command, accounts).await
    }

    async fn launch<C: Command>(
        &self,
        command: Arc<C>,
        accounts: Vec<Account>,
    ) -> Result<RunHandle<C::Output>, RunError> {
        self.provider.check()?;
        command
            .pre_hook()
            .await
            .map_err(|e| RunError::PreHook(format!("{e:#}")))?;

        let run_id = Uuid::new_v4();
        let concurrency = self
            .options
            .effective_concurrency(command.declared_max_concurrency());

        let state = RunState::new();
        for account in &accounts {
            state.add_task(account.id.clone());
        }

        let cancel = CancellationToken::new();
        let (bus, bus_workers) = Bus::spawn(run_id, &self.subscribers);
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            run_id,
            command,
            provider: Arc::clone(&self.provider),
            options: self.options.clone(),
            concurrency,
            accounts: accounts.into_iter().map(Arc::new).collect(),
            state: state.clone(),
            bus,
            bus_workers,
            cancel: cancel.clone(),
            stream: stream_tx,
        };
        let span = info_span!("run", id = %run_id, command = driver.command.name());
        let join = tokio::spawn(driver.drive().instrument(span));

        Ok(RunHandle {
            run_id,
            outcomes: stream_rx,
            cancel,
            state,
            join,
        })
    }
}

/// A run in progress.
///
/// Outcomes can be consumed as they are produced with [`RunHandle::next`]; [`RunHandle::finish`] waits for the ordered report.
/// Dropping the handle does not stop the run; call [`RunHandle::cancel`] for that.
pub struct RunHandle<T> {
    run_id: Uuid,
    outcomes: mpsc::UnboundedReceiver<Outcome<T>>,
    cancel: CancellationToken,
    state: RunState,
    join: JoinHandle<RunReport<T>>,
}

impl<T> RunHandle<T> {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Next outcome in the configured stream order, `None` once every account reported.
    pub async fn next(&mut self) -> Option<Outcome<T>> {
        self.outcomes.recv().await
    }

    /// Stop dispatching: pending accounts become cancelled, in-flight ones are asked to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase()
    }

    /// Current per-account state, in selection order.
    pub fn snapshot(&self) -> Vec<TaskInfo> {
        self.state.list_all()
    }

    /// Wait for the run to end and return the report.
    pub async fn finish(self) -> Result<RunReport<T>, RunError> {
        drop(self.outcomes);
        self.join.await.map_err(|e| RunError::Driver(e.to_string()))
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport<T> {
    pub run_id: Uuid,
    pub command: String,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
    /// Whether cancellation, requested or from the overall timeout, stopped at least one account.
    pub cancelled: bool,
    /// One outcome per selected account, in selection order.
    pub outcomes: Vec<Outcome<T>>,
    pub summary: RunSummary,
}

impl<T> RunReport<T> {
    pub fn new(run_id: Uuid, command: String, elapsed: Duration, cancelled: bool, outcomes: Vec<Outcome<T>>) -> Self {
        let summary = RunSummary::from_outcomes(&outcomes);
        Self {
            run_id,
            command,
            elapsed,
            cancelled,
            outcomes,
            summary,
        }
    }

    /// Process exit code: zero only when every account succeeded.
    pub fn exit_code(&self) -> i32 {
        if self.summary.all_succeeded() { 0 } else { 1 }
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome<T>> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

fn as_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    (elapsed.as_millis() as u64).serialize(serializer)
}
