use serde::{Deserialize, Serialize};

use acctrun_model::AccountId;

use crate::{FilterGroup, Predicate, PredicateMode, SelectionError};

/// What to select when the criteria name neither ids nor include groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WhenUnfiltered {
    /// Every pool account minus exclusions ("run everywhere").
    #[default]
    SelectAll,
    /// Nothing; the caller must name accounts or filters.
    SelectNone,
}

/// Which accounts a run targets.
///
/// Explicit ids always come first in the order given and are never removed by exclude predicates.
/// They are followed by pool accounts matching any include group and no exclude predicate.
#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    pub accounts: Vec<AccountId>,
    pub include: Vec<FilterGroup>,
    pub exclude: Vec<Predicate>,
    pub when_unfiltered: WhenUnfiltered,
}

impl SelectionCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria that select exactly the given ids.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AccountId>,
    {
        Self::new().with_accounts(ids)
    }

    pub fn with_accounts<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AccountId>,
    {
        self.accounts.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn include(mut self, group: FilterGroup) -> Self {
        self.include.push(group);
        self
    }

    pub fn exclude(mut self, predicate: Predicate) -> Self {
        self.exclude.push(predicate);
        self
    }

    pub fn when_unfiltered(mut self, policy: WhenUnfiltered) -> Self {
        self.when_unfiltered = policy;
        self
    }

    /// True when no ids and no include groups were given.
    pub fn is_unfiltered(&self) -> bool {
        self.accounts.is_empty() && self.include.iter().all(FilterGroup::is_empty)
    }
}

/// Serializable form of [`SelectionCriteria`], as found in configuration files.
///
/// ```json
/// { "accounts": ["100"], "include": [["region=us-east-1", "env=prod"]], "exclude": ["status=closed"] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionConfig {
    pub accounts: Vec<String>,
    pub include: Vec<Vec<String>>,
    pub exclude: Vec<String>,
    pub predicate_mode: PredicateMode,
    pub when_unfiltered: WhenUnfiltered,
}

impl SelectionConfig {
    /// Parse every predicate; regexes are compiled here, once per run.
    pub fn to_criteria(&self) -> Result<SelectionCriteria, SelectionError> {
        let include = self
            .include
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| FilterGroup::parse(g, self.predicate_mode))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude = self
            .exclude
            .iter()
            .map(|e| Predicate::parse(e, self.predicate_mode))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SelectionCriteria {
            accounts: self.accounts.iter().map(|s| AccountId::from(s.trim())).collect(),
            include,
            exclude,
            when_unfiltered: self.when_unfiltered,
        })
    }
}

impl TryFrom<&SelectionConfig> for SelectionCriteria {
    type Error = SelectionError;

    fn try_from(cfg: &SelectionConfig) -> Result<Self, Self::Error> {
        cfg.to_criteria()
    }
}
