use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::info;

use acctrun_model::AccountId;

use crate::{CredentialError, CredentialProvider, Credentials, Session};

/// Named profiles: the profile named after the account id wins, otherwise the default profile is used.
#[derive(Debug, Clone, Default)]
pub struct ProfileProvider {
    profiles: BTreeMap<String, Credentials>,
    default_profile: Option<String>,
}

impl ProfileProvider {
    pub fn new(profiles: BTreeMap<String, Credentials>) -> Self {
        Self {
            profiles,
            default_profile: None,
        }
    }

    pub fn with_default(mut self, profile: impl Into<String>) -> Self {
        self.default_profile = Some(profile.into());
        self
    }
}

#[async_trait]
impl CredentialProvider for ProfileProvider {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn check(&self) -> Result<(), CredentialError> {
        match &self.default_profile {
            Some(name) if !self.profiles.contains_key(name) => Err(CredentialError::not_configured(
                format!("default profile '{name}' is not defined"),
            )),
            _ => Ok(()),
        }
    }

    async fn acquire(&self, account: &AccountId) -> Result<Session, CredentialError> {
        if let Some(creds) = self.profiles.get(account.as_str()) {
            return Ok(Session::new(account.clone(), self.name(), creds.clone()).with_profile(account.as_str()));
        }

        let Some(default) = &self.default_profile else {
            return Err(CredentialError::not_configured(format!(
                "no profile for account {account} and no default profile"
            )));
        };
        let creds = self.profiles.get(default).ok_or_else(|| {
            CredentialError::not_configured(format!("default profile '{default}' is not defined"))
        })?;
        info!(account = %account, profile = %default, "using default profile");
        Ok(Session::new(account.clone(), self.name(), creds.clone()).with_profile(default.clone()))
    }
}
