//! Credential acquisition for per-account sessions.
//!
//! A [`CredentialProvider`] turns an account id into a [`Session`] or a classified [`CredentialError`].
//! Providers are called concurrently by the runner for different accounts and must not serialise unless the backend demands it; [`SharedStep`] covers that case.
pub mod error;
pub use error::CredentialError;

mod session;
pub use session::{Credentials, Session};

mod expiring;
pub use expiring::ExpiringValue;

mod provider;
pub use provider::{
    CachingProvider, CredentialProvider, CredentialSource, DerivedSource, ProfileProvider,
    ProviderConfig, SharedStep, StaticProvider, build_provider,
};
