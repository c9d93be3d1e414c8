use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};

use acctrun_model::AccountId;

/// Secret material handed to commands.
///
/// `Debug` never prints the secret or the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Credentials {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Authenticated handle for exactly one account.
///
/// A session belongs to the account it was acquired for and lives for one command invocation.
#[derive(Debug, Clone)]
pub struct Session {
    account: AccountId,
    provider: &'static str,
    profile: Option<String>,
    credentials: Credentials,
    expires_at: Option<SystemTime>,
}

impl Session {
    pub fn new(account: AccountId, provider: &'static str, credentials: Credentials) -> Self {
        Self {
            account,
            provider,
            profile: None,
            credentials,
            expires_at: None,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_expiry(mut self, at: SystemTime) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Name of the provider that issued the session.
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= SystemTime::now())
    }
}
