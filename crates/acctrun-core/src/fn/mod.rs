use std::{future::Future, num::NonZeroUsize, pin::Pin, sync::Arc};

use async_trait::async_trait;

use crate::{Command, CommandError, ExecContext};

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, CommandError>> + Send>>;
type Func<T> = dyn Fn(ExecContext) -> BoxFuture<T> + Send + Sync;

/// Command built from an async closure.
///
/// ```ignore
/// let cmd = FnCommand::new("whoami", |ctx: ExecContext| async move {
///     Ok(ctx.session().credentials().key_id.clone())
/// });
/// ```
pub struct FnCommand<T> {
    name: String,
    max_concurrency: Option<NonZeroUsize>,
    func: Arc<Func<T>>,
}

impl<T: Clone + Send + Sync + 'static> FnCommand<T> {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(ExecContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CommandError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            max_concurrency: None,
            func: Arc::new(move |ctx| Box::pin(func(ctx))),
        }
    }

    /// Cap concurrency for this command; zero means no cap.
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = NonZeroUsize::new(n);
        self
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Command for FnCommand<T> {
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn declared_max_concurrency(&self) -> Option<NonZeroUsize> {
        self.max_concurrency
    }

    async fn execute(&self, ctx: ExecContext) -> Result<T, CommandError> {
        (self.func)(ctx).await
    }
}
