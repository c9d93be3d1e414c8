use std::collections::HashMap;

use async_trait::async_trait;

use acctrun_model::AccountId;

use crate::{CredentialError, CredentialProvider, Credentials, Session};

/// Fixed credentials per account, with an optional catch-all.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    accounts: HashMap<AccountId, Credentials>,
    fallback: Option<Credentials>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: impl Into<AccountId>, creds: Credentials) -> Self {
        self.accounts.insert(account.into(), creds);
        self
    }

    /// Credentials used for any account without its own entry.
    pub fn with_fallback(mut self, creds: Credentials) -> Self {
        self.fallback = Some(creds);
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    fn check(&self) -> Result<(), CredentialError> {
        if self.accounts.is_empty() && self.fallback.is_none() {
            return Err(CredentialError::not_configured("static provider has no credentials"));
        }
        Ok(())
    }

    async fn acquire(&self, account: &AccountId) -> Result<Session, CredentialError> {
        let creds = self
            .accounts
            .get(account)
            .or(self.fallback.as_ref())
            .ok_or_else(|| CredentialError::not_configured(format!("no credentials for account {account}")))?;
        Ok(Session::new(account.clone(), self.name(), creds.clone()))
    }
}
