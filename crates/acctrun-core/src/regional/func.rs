use std::{future::Future, num::NonZeroUsize, pin::Pin, sync::Arc};

use async_trait::async_trait;

use super::RegionalCommand;
use crate::{CommandError, ExecContext};

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, CommandError>> + Send>>;
type Func<T> = dyn Fn(ExecContext, String) -> BoxFuture<T> + Send + Sync;

/// Regional command built from an async closure called once per (account, region).
///
/// ```ignore
/// let cmd = Regional::new(RegionalFnCommand::new("vpcs", ["us-east-1", "eu-west-1"], |ctx, region| async move {
///     Ok(format!("{}/{region}", ctx.account_id()))
/// }));
/// ```
pub struct RegionalFnCommand<T> {
    name: String,
    regions: Vec<String>,
    max_concurrency: Option<NonZeroUsize>,
    func: Arc<Func<T>>,
}

impl<T: Clone + Send + Sync + 'static> RegionalFnCommand<T> {
    pub fn new<I, S, F, Fut>(name: impl Into<String>, regions: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ExecContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CommandError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            regions: regions.into_iter().map(Into::into).collect(),
            max_concurrency: None,
            func: Arc::new(move |ctx, region| Box::pin(func(ctx, region))),
        }
    }

    /// Cap concurrency for this command; zero means no cap.
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = NonZeroUsize::new(n);
        self
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> RegionalCommand for RegionalFnCommand<T> {
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn regions(&self) -> &[String] {
        &self.regions
    }

    fn declared_max_concurrency(&self) -> Option<NonZeroUsize> {
        self.max_concurrency
    }

    async fn regional_execute(&self, ctx: &ExecContext, region: &str) -> Result<T, CommandError> {
        (self.func)(ctx.clone(), region.to_string()).await
    }
}
