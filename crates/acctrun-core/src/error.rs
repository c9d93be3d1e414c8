use thiserror::Error;

use acctrun_creds::CredentialError;
use acctrun_select::{SelectionError, SourceError};

/// Error reported by a command for one account.
///
/// Rendered into the account's outcome with its full cause chain; never retried by the runner.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Failed(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The command stopped because it observed [`crate::ExecContext::cancel_token`].
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommandError {
    pub fn failed(msg: impl Into<String>) -> Self {
        CommandError::Failed(msg.into())
    }

    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        CommandError::InvalidArguments(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CommandError::Cancelled)
    }
}

/// Fatal error raised before any account is dispatched.
///
/// Distinct from per-account failures, which are always recorded as outcomes.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("selection: {0}")]
    Selection(#[from] SelectionError),
    #[error("account source: {0}")]
    Source(#[from] SourceError),
    #[error("invalid command arguments: {0}")]
    InvalidArguments(String),
    #[error("credential provider misconfigured: {0}")]
    Provider(#[from] CredentialError),
    #[error("invalid run options: {0}")]
    InvalidOptions(String),
    #[error("pre-hook failed: {0}")]
    PreHook(String),
    #[error("run driver terminated unexpectedly: {0}")]
    Driver(String),
}
