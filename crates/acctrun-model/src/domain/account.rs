use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{AccountId, MetaValue};

/// One target account: an identifier plus its metadata.
///
/// Accounts are immutable once a pool has been loaded for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account or subscription identifier.
    pub id: AccountId,
    /// Metadata keys mapped to scalar values, kept sorted for deterministic iteration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetaValue>,
}

impl Account {
    /// Create an account without metadata.
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry, replacing any previous value for the same key.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// Look up a metadata value, ignoring ASCII case on the key.
    ///
    /// An exact key match wins over a case-insensitive one.
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        if let Some(value) = self.metadata.get(key) {
            return Some(value);
        }
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}
