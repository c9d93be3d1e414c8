use std::{num::NonZeroUsize, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};

use acctrun_model::{BackoffStrategy, JitterStrategy};

use crate::RunError;

/// Worker pool size used when the caller does not pick one.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// How long in-flight tasks may run after cancellation before a grace warning is emitted.
pub const DEFAULT_GRACE_MS: u64 = 5_000;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Order in which a streaming run hands out outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamOrder {
    /// As soon as each account finishes.
    #[default]
    Completion,
    /// Strictly in selection order; early finishers wait for their predecessors.
    Selection,
}

/// Retry policy for transient credential failures.
///
/// Command failures are never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::default(),
        }
    }

    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self { max_attempts, backoff }
    }

    /// Delay before retry `retry` (1-based), jitter included.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.backoff.base_delay(retry).as_millis() as u64;
        let ms = match self.backoff.jitter {
            JitterStrategy::None => base,
            JitterStrategy::Full => rand::thread_rng().gen_range(0..=base),
            JitterStrategy::Equal => base / 2 + rand::thread_rng().gen_range(0..=base - base / 2),
        };
        Duration::from_millis(ms)
    }
}

/// Knobs of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    /// Upper bound on accounts processed at once. A command may lower it, never raise it.
    pub max_concurrency: usize,
    /// Deadline for one account's command execution.
    pub per_account_timeout_ms: Option<u64>,
    /// Deadline for the whole run; elapsing cancels it.
    pub overall_timeout_ms: Option<u64>,
    pub grace_ms: u64,
    pub retry: RetryPolicy,
    pub stream_order: StreamOrder,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            per_account_timeout_ms: None,
            overall_timeout_ms: None,
            grace_ms: DEFAULT_GRACE_MS,
            retry: RetryPolicy::default(),
            stream_order: StreamOrder::default(),
        }
    }
}

impl RunOptions {
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_per_account_timeout(mut self, timeout: Duration) -> Self {
        self.per_account_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stream_order(mut self, order: StreamOrder) -> Self {
        self.stream_order = order;
        self
    }

    pub fn per_account_timeout(&self) -> Option<Duration> {
        self.per_account_timeout_ms.map(Duration::from_millis)
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_ms.map(Duration::from_millis)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.max_concurrency == 0 {
            return Err(RunError::InvalidOptions("maxConcurrency must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(RunError::InvalidOptions("retry.maxAttempts must be at least 1".into()));
        }
        if self.per_account_timeout_ms == Some(0) || self.overall_timeout_ms == Some(0) {
            return Err(RunError::InvalidOptions("timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Pool size for a command: `min(max_concurrency, declared)`.
    pub fn effective_concurrency(&self, declared: Option<NonZeroUsize>) -> usize {
        match declared {
            Some(n) => self.max_concurrency.min(n.get()),
            None => self.max_concurrency,
        }
    }
}
