//! Commands that work region by region inside each account.
//!
//! Accounts still run concurrently. The regions of one account run one after another on the
//! same session, and every region keeps its own result so one failing region does not hide the others.
use std::num::NonZeroUsize;

use async_trait::async_trait;
use tracing::{debug, warn};

use acctrun_model::{AccountId, Outcome};

use crate::{Command, CommandError, ExecContext};

mod func;
pub use func::RegionalFnCommand;

/// Result of one region: the value or the rendered error.
pub type RegionResult<T> = Result<T, String>;

/// Per-account output of a regional command, in the order the regions were configured.
pub type RegionalOutput<T> = Vec<(String, RegionResult<T>)>;

/// A command executed once per (account, region) pair.
///
/// Wrap it in [`Regional`] to hand it to a [`crate::Runner`].
#[async_trait]
pub trait RegionalCommand: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Regions processed for every account; must not be empty.
    fn regions(&self) -> &[String];

    fn validate(&self) -> Result<(), CommandError> {
        Ok(())
    }

    fn declared_max_concurrency(&self) -> Option<NonZeroUsize> {
        None
    }

    async fn pre_hook(&self) -> Result<(), CommandError> {
        Ok(())
    }

    async fn regional_execute(&self, ctx: &ExecContext, region: &str) -> Result<Self::Output, CommandError>;

    /// Called for each region of a finished account, in region order, never concurrently with itself.
    fn on_region_outcome(&self, _account: &AccountId, _region: &str, _result: &RegionResult<Self::Output>) {}

    async fn post_hook(&self, _outcomes: &[Outcome<RegionalOutput<Self::Output>>]) -> Result<(), CommandError> {
        Ok(())
    }
}

/// Runs a [`RegionalCommand`] as a plain [`Command`].
pub struct Regional<R>(pub R);

impl<R: RegionalCommand> Regional<R> {
    pub fn new(command: R) -> Self {
        Self(command)
    }

    pub fn inner(&self) -> &R {
        &self.0
    }
}

#[async_trait]
impl<R: RegionalCommand> Command for Regional<R> {
    type Output = RegionalOutput<R::Output>;

    fn name(&self) -> &str {
        self.0.name()
    }

    fn validate(&self) -> Result<(), CommandError> {
        if self.0.regions().is_empty() {
            return Err(CommandError::invalid_arguments("no regions specified"));
        }
        if let Some(blank) = self.0.regions().iter().find(|r| r.trim().is_empty()) {
            return Err(CommandError::invalid_arguments(format!("invalid region '{blank}'")));
        }
        self.0.validate()
    }

    fn declared_max_concurrency(&self) -> Option<NonZeroUsize> {
        self.0.declared_max_concurrency()
    }

    async fn pre_hook(&self) -> Result<(), CommandError> {
        self.0.pre_hook().await
    }

    async fn execute(&self, ctx: ExecContext) -> Result<Self::Output, CommandError> {
        let regions = self.0.regions();
        let mut results = Vec::with_capacity(regions.len());

        for region in regions {
            // stop between regions; a half-processed account is reported as cancelled
            if ctx.is_cancelled() {
                debug!(account = %ctx.account_id(), region, done = results.len(), "skipping remaining regions");
                return Err(CommandError::Cancelled);
            }
            match self.0.regional_execute(&ctx, region).await {
                Ok(value) => results.push((region.clone(), Ok(value))),
                Err(e) if e.is_cancelled() && ctx.is_cancelled() => return Err(e),
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(account = %ctx.account_id(), region, error = %reason, "region failed");
                    results.push((region.clone(), Err(reason)));
                }
            }
        }
        Ok(results)
    }

    fn on_outcome(&self, outcome: &Outcome<Self::Output>) {
        let Some(regions) = outcome.value() else {
            return;
        };
        for (region, result) in regions {
            self.0.on_region_outcome(&outcome.account, region, result);
        }
    }

    async fn post_hook(&self, outcomes: &[Outcome<Self::Output>]) -> Result<(), CommandError> {
        self.0.post_hook(outcomes).await
    }
}
