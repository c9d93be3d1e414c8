use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, instrument};

use acctrun_model::{Account, AccountId, MetaValue};

use crate::{SelectionCriteria, SelectionError, WhenUnfiltered};

/// Resolve `criteria` against `pool`.
///
/// The result is deterministic for the same inputs: explicit ids first (deduplicated, in the order given), then matching pool accounts in pool order.
/// Any explicit id missing from the pool fails the whole selection. An empty pool yields an empty selection.
#[instrument(level = "debug", skip_all, fields(pool = pool.len(), ids = criteria.accounts.len()))]
pub fn select(pool: &[Account], criteria: &SelectionCriteria) -> Result<Vec<Account>, SelectionError> {
    let by_id: HashMap<&AccountId, &Account> = pool.iter().map(|a| (&a.id, a)).collect();

    let unknown: Vec<String> = criteria
        .accounts
        .iter()
        .filter(|id| !by_id.contains_key(id))
        .map(|id| id.to_string())
        .collect();
    if !unknown.is_empty() {
        return Err(SelectionError::UnknownAccounts(unknown));
    }

    let mut seen: HashSet<&AccountId> = HashSet::new();
    let mut selected = Vec::new();

    for id in &criteria.accounts {
        if seen.insert(id)
            && let Some(account) = by_id.get(id)
        {
            selected.push((*account).clone());
        }
    }

    let groups: Vec<_> = criteria.include.iter().filter(|g| !g.is_empty()).collect();
    let take_all = criteria.is_unfiltered() && criteria.when_unfiltered == WhenUnfiltered::SelectAll;

    for account in pool {
        if seen.contains(&account.id) {
            continue;
        }
        let included = take_all || groups.iter().any(|g| g.matches(account));
        if !included {
            continue;
        }
        if let Some(p) = criteria.exclude.iter().find(|p| p.matches(account)) {
            debug!(account = %account.id, predicate = %p, "excluded");
            continue;
        }
        seen.insert(&account.id);
        selected.push(account.clone());
    }

    debug!(selected = selected.len(), "selection resolved");
    Ok(selected)
}

/// Every metadata key in the pool with the sorted set of its distinct non-null values.
///
/// Handy for discovering what can be filtered on.
pub fn attributes(pool: &[Account]) -> BTreeMap<String, Vec<String>> {
    let mut attrs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for account in pool {
        for (key, value) in &account.metadata {
            let values = attrs.entry(key.clone()).or_default();
            if !value.is_null() {
                values.insert(value.to_string());
            }
        }
    }
    attrs
        .into_iter()
        .map(|(k, v)| (k, v.into_iter().collect()))
        .collect()
}

/// Distinct non-null values of one key (case-insensitive), sorted by their text form.
pub fn values_of(pool: &[Account], key: &str) -> Vec<MetaValue> {
    let mut out: BTreeMap<String, MetaValue> = BTreeMap::new();
    for value in pool.iter().filter_map(|a| a.get(key)) {
        if !value.is_null() {
            out.entry(value.to_string()).or_insert_with(|| value.clone());
        }
    }
    out.into_values().collect()
}
