use std::{fmt, time::Duration};

use serde::{Serialize, Serializer};

use crate::{AccountId, Failure, TaskError, TaskIndex, TaskStatus};

/// Terminal result for one selected account.
///
/// A run produces exactly one outcome per selected account, including accounts that were cancelled before they started.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome<T> {
    /// Account the outcome belongs to.
    pub account: AccountId,
    /// Position of the account in the selection order.
    pub index: TaskIndex,
    /// Wall time between dispatch and completion (zero for never-dispatched tasks).
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
    /// Credential acquisition attempts that were made.
    pub attempts: u32,
    /// Value returned by the command, or the classified failure.
    pub result: Result<T, Failure>,
}

impl<T> Outcome<T> {
    pub fn success(account: AccountId, index: TaskIndex, value: T) -> Self {
        Self {
            account,
            index,
            elapsed: Duration::ZERO,
            attempts: 0,
            result: Ok(value),
        }
    }

    pub fn failure(account: AccountId, index: TaskIndex, error: TaskError) -> Self {
        Self {
            account,
            index,
            elapsed: Duration::ZERO,
            attempts: 0,
            result: Err(Failure::new(error)),
        }
    }

    /// Outcome for a task that never left the queue.
    pub fn cancelled(account: AccountId, index: TaskIndex) -> Self {
        Self::failure(account, index, TaskError::Cancelled)
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Terminal status implied by the result.
    pub fn status(&self) -> TaskStatus {
        match &self.result {
            Ok(_) => TaskStatus::Succeeded,
            Err(f) => match f.error {
                TaskError::Cancelled => TaskStatus::Cancelled,
                TaskError::Timeout { .. } => TaskStatus::TimedOut,
                TaskError::Credential { .. } | TaskError::Command { .. } => TaskStatus::Failed,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn failure_ref(&self) -> Option<&Failure> {
        self.result.as_ref().err()
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(value) => write!(f, "{}: {}", self.account, value),
            Err(failure) => write!(f, "{}: error: {}", self.account, failure),
        }
    }
}

fn as_millis<S>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    (elapsed.as_millis() as u64).serialize(serializer)
}
