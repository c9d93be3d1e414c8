use std::{num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use acctrun_creds::Session;
use acctrun_model::{Account, AccountId, Outcome, TaskIndex};

use crate::CommandError;

/// Everything one command invocation gets: its own session, the account and a cancellation signal.
///
/// Clones share the session and the cancellation signal.
#[derive(Clone)]
pub struct ExecContext {
    session: Session,
    account: Arc<Account>,
    index: TaskIndex,
    cancel: CancellationToken,
}

impl ExecContext {
    pub fn new(session: Session, account: Arc<Account>, index: TaskIndex, cancel: CancellationToken) -> Self {
        Self {
            session,
            account,
            index,
            cancel,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account.id
    }

    /// Position of the account in the selection.
    pub fn index(&self) -> TaskIndex {
        self.index
    }

    /// Cancelled when the run is aborted or this account's deadline passes.
    ///
    /// Observing it is optional: a command that ignores it simply runs to completion.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A unit of work executed once per selected account.
///
/// `execute` runs concurrently for different accounts. The hooks run on a single task:
/// `pre_hook` before any account is dispatched, `on_outcome` once per account as results arrive, `post_hook` after the last outcome.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Check arguments before the run; an error aborts the run before any account is touched.
    fn validate(&self) -> Result<(), CommandError> {
        Ok(())
    }

    /// Upper bound on concurrent executions this command tolerates.
    ///
    /// It can only lower the caller's `max_concurrency`.
    fn declared_max_concurrency(&self) -> Option<NonZeroUsize> {
        None
    }

    async fn pre_hook(&self) -> Result<(), CommandError> {
        Ok(())
    }

    async fn execute(&self, ctx: ExecContext) -> Result<Self::Output, CommandError>;

    /// Called once per account in completion order, never concurrently with itself.
    fn on_outcome(&self, _outcome: &Outcome<Self::Output>) {}

    /// Runs after every outcome was collected, cancelled runs included. Errors are logged only.
    async fn post_hook(&self, _outcomes: &[Outcome<Self::Output>]) -> Result<(), CommandError> {
        Ok(())
    }
}
