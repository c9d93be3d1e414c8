use thiserror::Error;

use acctrun_model::{CredentialFault, TaskError};

/// Failure to produce a session for one account.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {reason}")]
pub struct CredentialError {
    pub kind: CredentialFault,
    pub reason: String,
}

impl CredentialError {
    pub fn new(kind: CredentialFault, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn auth_failure(reason: impl Into<String>) -> Self {
        Self::new(CredentialFault::AuthFailure, reason)
    }

    pub fn not_configured(reason: impl Into<String>) -> Self {
        Self::new(CredentialFault::NotConfigured, reason)
    }

    pub fn expired(reason: impl Into<String>) -> Self {
        Self::new(CredentialFault::Expired, reason)
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::new(CredentialFault::Transient, reason)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<CredentialError> for TaskError {
    fn from(e: CredentialError) -> Self {
        TaskError::Credential {
            fault: e.kind,
            reason: e.reason,
        }
    }
}
