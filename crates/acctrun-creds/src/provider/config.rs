use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{CredentialProvider, Credentials, ProfileProvider, StaticProvider};

/// Which credential provider to use, resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProviderConfig {
    Static {
        #[serde(default)]
        accounts: BTreeMap<String, Credentials>,
        #[serde(default)]
        fallback: Option<Credentials>,
    },
    #[serde(rename_all = "camelCase")]
    Profile {
        #[serde(default)]
        profiles: BTreeMap<String, Credentials>,
        #[serde(default)]
        default_profile: Option<String>,
    },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Profile {
            profiles: BTreeMap::new(),
            default_profile: None,
        }
    }
}

pub fn build_provider(cfg: &ProviderConfig) -> Arc<dyn CredentialProvider> {
    match cfg {
        ProviderConfig::Static { accounts, fallback } => {
            let mut p = accounts
                .iter()
                .fold(StaticProvider::new(), |p, (id, creds)| p.with_account(id.as_str(), creds.clone()));
            if let Some(creds) = fallback {
                p = p.with_fallback(creds.clone());
            }
            Arc::new(p)
        }
        ProviderConfig::Profile {
            profiles,
            default_profile,
        } => {
            let mut p = ProfileProvider::new(profiles.clone());
            if let Some(name) = default_profile {
                p = p.with_default(name.clone());
            }
            Arc::new(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acctrun_model::AccountId;

    #[tokio::test]
    async fn profile_config_from_json() {
        let cfg: ProviderConfig = serde_json::from_str(
            r#"{
                "kind": "profile",
                "profiles": {"ops": {"keyId": "AKIA", "secret": "s"}},
                "defaultProfile": "ops"
            }"#,
        )
        .unwrap();
        let p = build_provider(&cfg);
        assert_eq!(p.name(), "profile");
        assert!(p.check().is_ok());
        let s = p.acquire(&AccountId::from("42")).await.unwrap();
        assert_eq!(s.profile(), Some("ops"));
    }

    #[test]
    fn static_config_without_credentials_fails_check() {
        let cfg: ProviderConfig = serde_json::from_str(r#"{"kind": "static"}"#).unwrap();
        assert!(build_provider(&cfg).check().is_err());
    }
}
