use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tracing::debug;

use acctrun_model::{AccountId, CredentialFault};

use crate::{CredentialError, CredentialProvider, Credentials, ExpiringValue, Session};

/// Backend that exchanges an account and role for fresh credentials.
///
/// Every call is assumed to be expensive (a network round trip); [`CachingProvider`] sits in front of it.
#[async_trait]
pub trait CredentialSource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        account: &AccountId,
        role: &str,
        duration: Duration,
    ) -> Result<Credentials, CredentialError>;
}

type Cached = ExpiringValue<(Credentials, SystemTime)>;

/// Caches credentials per `(account, role)` for half of the session duration.
///
/// Different accounts never wait on each other: each key has its own [`ExpiringValue`].
pub struct CachingProvider<S> {
    source: S,
    role: String,
    duration: Duration,
    entries: Mutex<HashMap<(AccountId, String), Arc<Cached>>>,
}

impl<S: CredentialSource> CachingProvider<S> {
    pub fn new(source: S, role: impl Into<String>, duration: Duration) -> Self {
        Self {
            source,
            role: role.into(),
            duration,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Acquire a session for an explicit role instead of the configured one.
    pub async fn acquire_role(&self, account: &AccountId, role: &str) -> Result<Session, CredentialError> {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries
                .entry((account.clone(), role.to_string()))
                .or_insert_with(|| Arc::new(ExpiringValue::new(self.duration / 2)))
                .clone()
        };

        let (creds, expires_at) = entry
            .value(false, || async {
                debug!(account = %account, role, source = self.source.name(), "fetching credentials");
                let creds = self.source.fetch(account, role, self.duration).await?;
                Ok::<_, CredentialError>((creds, SystemTime::now() + self.duration))
            })
            .await?;

        Ok(Session::new(account.clone(), self.source.name(), creds)
            .with_profile(role)
            .with_expiry(expires_at))
    }
}

#[async_trait]
impl<S: CredentialSource> CredentialProvider for CachingProvider<S> {
    fn name(&self) -> &'static str {
        self.source.name()
    }

    fn check(&self) -> Result<(), CredentialError> {
        if self.role.is_empty() {
            return Err(CredentialError::not_configured("no role configured"));
        }
        if self.duration.is_zero() {
            return Err(CredentialError::not_configured("session duration must be positive"));
        }
        Ok(())
    }

    async fn acquire(&self, account: &AccountId) -> Result<Session, CredentialError> {
        self.acquire_role(account, &self.role).await
    }
}

type StepFuture<T> = Pin<Box<dyn Future<Output = Result<T, CredentialError>> + Send>>;
type StepFn<T> = dyn Fn() -> StepFuture<T> + Send + Sync;

/// A credential step that must run once for all accounts, such as an interactive sign-in producing an assertion.
///
/// The first worker to need it runs the step while the others wait; afterwards every worker reuses the result until `max_age` elapses and fans back out.
pub struct SharedStep<T> {
    value: ExpiringValue<T>,
    step: Box<StepFn<T>>,
}

impl<T: Clone + Send + Sync + 'static> SharedStep<T> {
    pub fn new<F, Fut>(max_age: Duration, step: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CredentialError>> + Send + 'static,
    {
        Self {
            value: ExpiringValue::new(max_age),
            step: Box::new(move || Box::pin(step())),
        }
    }

    pub async fn get(&self) -> Result<T, CredentialError> {
        self.value.value(false, || (self.step)()).await
    }

    /// Current result together with its generation.
    pub async fn stamped(&self) -> Result<(T, u64), CredentialError> {
        self.value.stamped(|| (self.step)()).await
    }

    /// Re-run the step because the result of generation `seen` turned out stale.
    ///
    /// Callers that report the same stale generation share one run.
    pub async fn refresh_after(&self, seen: u64) -> Result<T, CredentialError> {
        self.value
            .refresh_after(seen, || (self.step)())
            .await
            .map(|(value, _)| value)
    }

    /// Run the step again even if the cached result is still fresh.
    pub async fn refresh(&self) -> Result<T, CredentialError> {
        self.value.value(true, || (self.step)()).await
    }
}

type DeriveFn<T> =
    dyn Fn(&T, &AccountId, &str, Duration) -> Result<Credentials, CredentialError> + Send + Sync;

/// A [`CredentialSource`] that derives per-account credentials from a [`SharedStep`] result.
///
/// When derivation reports the shared result as expired, the step is refreshed once and derivation retried.
pub struct DerivedSource<T> {
    name: &'static str,
    step: Arc<SharedStep<T>>,
    derive: Box<DeriveFn<T>>,
}

impl<T: Clone + Send + Sync + 'static> DerivedSource<T> {
    pub fn new<F>(name: &'static str, step: Arc<SharedStep<T>>, derive: F) -> Self
    where
        F: Fn(&T, &AccountId, &str, Duration) -> Result<Credentials, CredentialError> + Send + Sync + 'static,
    {
        Self {
            name,
            step,
            derive: Box::new(derive),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> CredentialSource for DerivedSource<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(
        &self,
        account: &AccountId,
        role: &str,
        duration: Duration,
    ) -> Result<Credentials, CredentialError> {
        let (shared, generation) = self.step.stamped().await?;
        match (self.derive)(&shared, account, role, duration) {
            Err(e) if e.kind == CredentialFault::Expired => {
                debug!(account = %account, generation, "shared step expired, refreshing");
                let shared = self.step.refresh_after(generation).await?;
                (self.derive)(&shared, account, role, duration)
            }
            other => other,
        }
    }
}
