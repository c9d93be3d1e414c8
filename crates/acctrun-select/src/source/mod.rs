use std::sync::Arc;

use async_trait::async_trait;

use acctrun_model::Account;

use crate::SourceError;

mod config;
pub use config::{SourceConfig, build_source};

mod identity;
pub use identity::IdentitySource;

mod json;
pub use json::JsonSource;

mod static_source;
pub use static_source::StaticSource;

/// Supplies the pool of accounts a selection is resolved against.
///
/// The pool is loaded once per run, never per account.
#[async_trait]
pub trait AccountSource: Send + Sync + 'static {
    /// Load every known account in a stable order.
    async fn load_pool(&self) -> Result<Vec<Account>, SourceError>;

    fn name(&self) -> &'static str;
}

#[async_trait]
impl<S: AccountSource + ?Sized> AccountSource for Arc<S> {
    async fn load_pool(&self) -> Result<Vec<Account>, SourceError> {
        (**self).load_pool().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
