use std::collections::HashSet;

use async_trait::async_trait;

use acctrun_model::{Account, AccountId};

use crate::{AccountSource, SourceError};

/// Accounts that are nothing but their ids.
///
/// Used when no metadata source is configured: only explicit ids can be selected meaningfully, since every metadata predicate misses.
#[derive(Debug, Clone, Default)]
pub struct IdentitySource {
    ids: Vec<AccountId>,
}

impl IdentitySource {
    /// Duplicates are dropped, first occurrence wins.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AccountId>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &AccountId| seen.insert(id.clone()))
            .collect();
        Self { ids }
    }
}

#[async_trait]
impl AccountSource for IdentitySource {
    async fn load_pool(&self) -> Result<Vec<Account>, SourceError> {
        Ok(self.ids.iter().cloned().map(Account::new).collect())
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dedups_and_keeps_order() {
        let src = IdentitySource::new(["2", "1", "2", "3"]);
        let pool = src.load_pool().await.unwrap();
        let ids: Vec<_> = pool.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["2", "1", "3"]);
        assert!(pool.iter().all(|a| a.metadata.is_empty()));
    }
}
