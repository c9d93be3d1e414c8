use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Jitter applied on top of the computed backoff delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JitterStrategy {
    /// Use the computed delay as is.
    #[default]
    None,
    /// Uniform random delay in `[0, delay]`.
    Full,
    /// `delay / 2` plus a uniform random value in `[0, delay / 2]`.
    Equal,
}

/// Capped exponential backoff between credential attempts.
///
/// The delay before retry `n` (1-based) is `min(first_ms * factor^(n-1), max_ms)`, before jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffStrategy {
    pub jitter: JitterStrategy,
    pub first_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            jitter: JitterStrategy::Full,
            first_ms: 200,
            max_ms: 5_000,
            factor: 2.0,
        }
    }
}

impl BackoffStrategy {
    /// Constant delay without jitter.
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            jitter: JitterStrategy::None,
            first_ms: delay_ms,
            max_ms: delay_ms,
            factor: 1.0,
        }
    }

    /// Delay before retry `retry` (1-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = if self.factor.is_finite() && self.factor >= 1.0 {
            self.factor
        } else {
            1.0
        };
        let raw = self.first_ms as f64 * factor.powi(exp);
        let capped = if raw.is_finite() {
            raw.min(self.max_ms as f64)
        } else {
            self.max_ms as f64
        };
        Duration::from_millis(capped.max(0.0) as u64)
    }
}
