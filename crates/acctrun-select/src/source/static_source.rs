use async_trait::async_trait;

use acctrun_model::Account;

use crate::{AccountSource, SourceError};

/// A fixed, in-memory pool.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    accounts: Vec<Account>,
}

impl StaticSource {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountSource for StaticSource {
    async fn load_pool(&self) -> Result<Vec<Account>, SourceError> {
        Ok(self.accounts.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
