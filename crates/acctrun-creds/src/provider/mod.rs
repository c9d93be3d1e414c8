use std::sync::Arc;

use async_trait::async_trait;

use acctrun_model::AccountId;

use crate::{CredentialError, Session};

mod caching;
pub use caching::{CachingProvider, CredentialSource, DerivedSource, SharedStep};

mod config;
pub use config::{ProviderConfig, build_provider};

mod profile;
pub use profile::ProfileProvider;

mod static_provider;
pub use static_provider::StaticProvider;

/// Produces per-account sessions.
///
/// Implementations are shared between workers and called concurrently for different accounts.
#[async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Short provider name used in logs and sessions.
    fn name(&self) -> &'static str;

    /// Validate the provider's own configuration before a run starts.
    ///
    /// An error here is fatal for the run: no account is processed.
    fn check(&self) -> Result<(), CredentialError> {
        Ok(())
    }

    /// Obtain a session for `account`.
    async fn acquire(&self, account: &AccountId) -> Result<Session, CredentialError>;
}

#[async_trait]
impl<P: CredentialProvider + ?Sized> CredentialProvider for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn check(&self) -> Result<(), CredentialError> {
        (**self).check()
    }

    async fn acquire(&self, account: &AccountId) -> Result<Session, CredentialError> {
        (**self).acquire(account).await
    }
}
