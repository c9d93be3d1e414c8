use std::{path::PathBuf, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use acctrun_model::Account;

use super::json::DEFAULT_ID_ATTR;
use crate::{AccountSource, IdentitySource, JsonSource, StaticSource};

/// Which account source to use, chosen once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SourceConfig {
    /// Accounts listed inline.
    Static {
        #[serde(default)]
        accounts: Vec<Account>,
    },
    /// Bare ids, no metadata.
    Identity {
        #[serde(default)]
        ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Json {
        path: PathBuf,
        #[serde(default = "default_id_attr")]
        id_attr: String,
        #[serde(default)]
        path_keys: Vec<String>,
        /// Zero disables the on-disk cache.
        #[serde(default)]
        max_age_secs: u64,
        #[serde(default)]
        cache_file: Option<PathBuf>,
        #[serde(default)]
        include_attrs: Vec<String>,
        #[serde(default)]
        exclude_attrs: Vec<String>,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Identity { ids: Vec::new() }
    }
}

fn default_id_attr() -> String {
    DEFAULT_ID_ATTR.to_string()
}

/// Resolve the configured source into a shared trait object.
pub fn build_source(cfg: &SourceConfig) -> Arc<dyn AccountSource> {
    match cfg {
        SourceConfig::Static { accounts } => Arc::new(StaticSource::new(accounts.clone())),
        SourceConfig::Identity { ids } => Arc::new(IdentitySource::new(ids.iter().cloned())),
        SourceConfig::Json {
            path,
            id_attr,
            path_keys,
            max_age_secs,
            cache_file,
            include_attrs,
            exclude_attrs,
        } => {
            let mut src = JsonSource::new(path)
                .with_id_attr(id_attr.clone())
                .with_path_keys(path_keys.clone())
                .with_include_attrs(include_attrs.clone())
                .with_exclude_attrs(exclude_attrs.clone());
            if *max_age_secs > 0 {
                let file = cache_file
                    .clone()
                    .unwrap_or_else(|| path.with_extension("cache.json"));
                src = src.with_cache(file, Duration::from_secs(*max_age_secs));
            }
            Arc::new(src)
        }
    }
}
