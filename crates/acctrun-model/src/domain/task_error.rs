use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TimeoutMs;

/// Why a credential provider could not hand out a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialFault {
    /// The identity provider rejected the caller.
    AuthFailure,
    /// No credentials are configured for the account.
    NotConfigured,
    /// Credentials expired and cannot be refreshed.
    Expired,
    /// Temporary failure (throttling, network blip); safe to retry.
    Transient,
}

impl CredentialFault {
    /// Only transient faults are retried by the runner.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CredentialFault::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialFault::AuthFailure => "auth-failure",
            CredentialFault::NotConfigured => "not-configured",
            CredentialFault::Expired => "expired-and-unrefreshable",
            CredentialFault::Transient => "transient",
        }
    }
}

impl fmt::Display for CredentialFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-account error recorded in an [`crate::Outcome`].
///
/// These never abort a run; each one is scoped to the account it happened on.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TaskError {
    #[error("credentials ({fault}): {reason}")]
    Credential { fault: CredentialFault, reason: String },
    #[error("command failed: {reason}")]
    Command { reason: String },
    #[error("cancelled")]
    Cancelled,
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: TimeoutMs },
}

/// A failed outcome: the error plus whether retrying the account later could help.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error: TaskError,
    pub retryable: bool,
}

impl Failure {
    /// Wrap an error, deriving `retryable` from its kind.
    ///
    /// Transient credential faults and timeouts are retryable; command errors are not, since re-running a command may not be safe.
    pub fn new(error: TaskError) -> Self {
        let retryable = match &error {
            TaskError::Credential { fault, .. } => fault.is_retryable(),
            TaskError::Timeout { .. } => true,
            TaskError::Command { .. } | TaskError::Cancelled => false,
        };
        Self { error, retryable }
    }

    pub fn cancelled() -> Self {
        Self::new(TaskError::Cancelled)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl From<TaskError> for Failure {
    fn from(error: TaskError) -> Self {
        Failure::new(error)
    }
}
