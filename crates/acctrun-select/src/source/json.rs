use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use acctrun_model::{Account, AccountId, MetaValue};

use crate::{AccountSource, PersistentCache, SourceError};

pub const DEFAULT_ID_ATTR: &str = "id";

/// Accounts read from a JSON document on disk.
///
/// The document is either a list of account objects or an object keyed by account id, optionally nested under `path_keys`.
/// Each account must carry a string id attribute. Metadata keys missing on some accounts are filled with null so every account exposes the same keys.
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: PathBuf,
    id_attr: String,
    path_keys: Vec<String>,
    include_attrs: Vec<String>,
    exclude_attrs: Vec<String>,
    cache: Option<PersistentCache>,
}

impl JsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            id_attr: DEFAULT_ID_ATTR.to_string(),
            path_keys: Vec::new(),
            include_attrs: Vec::new(),
            exclude_attrs: Vec::new(),
            cache: None,
        }
    }

    pub fn with_id_attr(mut self, attr: impl Into<String>) -> Self {
        self.id_attr = attr.into();
        self
    }

    pub fn with_path_keys(mut self, keys: Vec<String>) -> Self {
        self.path_keys = keys;
        self
    }

    /// Keep only these metadata keys (plus the id attribute).
    pub fn with_include_attrs(mut self, attrs: Vec<String>) -> Self {
        self.include_attrs = attrs;
        self
    }

    pub fn with_exclude_attrs(mut self, attrs: Vec<String>) -> Self {
        self.exclude_attrs = attrs;
        self
    }

    /// Cache the parsed pool in `file` for `max_age`.
    pub fn with_cache(mut self, file: impl Into<PathBuf>, max_age: Duration) -> Self {
        self.cache = Some(PersistentCache::new(file, max_age));
        self
    }

    /// Turn a parsed document into accounts, in document order.
    pub fn parse_document(&self, doc: Value) -> Result<Vec<Account>, SourceError> {
        if self.exclude_attrs.iter().any(|a| a == &self.id_attr) {
            return Err(SourceError::Invalid(format!(
                "cannot exclude the id attribute '{}'",
                self.id_attr
            )));
        }

        let mut node = doc;
        for key in &self.path_keys {
            node = match node {
                Value::Object(mut map) => map.remove(key),
                _ => None,
            }
            .ok_or_else(|| {
                SourceError::Invalid(format!(
                    "cannot find accounts under path {:?}, did you specify the correct path?",
                    self.path_keys
                ))
            })?;
        }

        let records = match node {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(SourceError::Invalid(format!("account is not an object: {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Object(map) => self.keyed_records(map)?,
            other => {
                return Err(SourceError::Invalid(format!(
                    "account list must be a list or an object of accounts, got: {other}"
                )));
            }
        };

        let mut accounts = Vec::with_capacity(records.len());
        let mut keys = BTreeSet::new();
        for mut record in records {
            let id = match record.remove(&self.id_attr) {
                Some(Value::String(id)) => id,
                Some(other) => {
                    return Err(SourceError::Invalid(format!("account id '{other}' is not a string")));
                }
                None => {
                    return Err(SourceError::Invalid(format!(
                        "no '{}' attribute in account {}",
                        self.id_attr,
                        Value::Object(record)
                    )));
                }
            };

            let mut metadata = BTreeMap::new();
            for (key, value) in record {
                if !self.keep_attr(&key) {
                    continue;
                }
                keys.insert(key.clone());
                metadata.insert(key, to_meta(value));
            }
            metadata.insert(self.id_attr.clone(), MetaValue::Str(id.clone()));
            accounts.push(Account {
                id: AccountId::new(id),
                metadata,
            });
        }

        for account in &mut accounts {
            for key in &keys {
                account.metadata.entry(key.clone()).or_insert(MetaValue::Null);
            }
        }
        Ok(accounts)
    }

    fn keyed_records(&self, map: Map<String, Value>) -> Result<Vec<Map<String, Value>>, SourceError> {
        let mut out = Vec::with_capacity(map.len());
        for (key, value) in map {
            let Value::Object(mut record) = value else {
                return Err(SourceError::Invalid(
                    "accounts are not objects, did you specify the correct path?".to_string(),
                ));
            };
            let id = record
                .entry(self.id_attr.clone())
                .or_insert_with(|| Value::String(key.clone()));
            if id.as_str() != Some(key.as_str()) {
                return Err(SourceError::Invalid(format!(
                    "account ids do not match: '{key}' != '{id}'"
                )));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn keep_attr(&self, key: &str) -> bool {
        if self.exclude_attrs.iter().any(|a| a == key) {
            return false;
        }
        self.include_attrs.is_empty() || self.include_attrs.iter().any(|a| a == key)
    }

    async fn read(&self) -> Result<Vec<Account>, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        let doc: Value = serde_json::from_slice(&bytes)?;
        self.parse_document(doc)
    }
}

#[async_trait]
impl AccountSource for JsonSource {
    async fn load_pool(&self) -> Result<Vec<Account>, SourceError> {
        if let Some(cache) = &self.cache {
            match cache.load::<Vec<Account>>() {
                Ok(Some(pool)) => return Ok(pool),
                Ok(None) => {}
                Err(e) => warn!(path = %cache.path().display(), error = %e, "ignoring unreadable account cache"),
            }
        }

        let pool = self.read().await?;
        debug!(path = %self.path.display(), accounts = pool.len(), "loaded accounts");

        if let Some(cache) = &self.cache {
            cache.save(&pool)?;
        }
        Ok(pool)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

fn to_meta(value: Value) -> MetaValue {
    match value {
        Value::Null => MetaValue::Null,
        Value::Bool(b) => MetaValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => MetaValue::Int(i),
            None => n.as_f64().map(MetaValue::Float).unwrap_or(MetaValue::Null),
        },
        Value::String(s) => MetaValue::Str(s),
        nested @ (Value::Array(_) | Value::Object(_)) => MetaValue::Str(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(pool: &[Account]) -> Vec<&str> {
        pool.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn list_document_fills_missing_keys_with_null() {
        let src = JsonSource::new("unused");
        let pool = src
            .parse_document(json!([
                {"id": "1", "env": "prod"},
                {"id": "2", "region": "us-east-1", "tier": 3}
            ]))
            .unwrap();
        assert_eq!(ids(&pool), ["1", "2"]);
        assert_eq!(pool[0].get("region"), Some(&MetaValue::Null));
        assert_eq!(pool[1].get("env"), Some(&MetaValue::Null));
        assert_eq!(pool[1].get("tier"), Some(&MetaValue::Int(3)));
        assert_eq!(pool[0].get("id"), Some(&MetaValue::from("1")));
    }

    #[test]
    fn keyed_document_under_path() {
        let src = JsonSource::new("unused").with_path_keys(vec!["results".into(), "accounts".into()]);
        let pool = src
            .parse_document(json!({"results": {"accounts": {
                "100": {"env": "prod"},
                "200": {"id": "200", "env": "dev"}
            }}}))
            .unwrap();
        assert_eq!(ids(&pool), ["100", "200"]);
    }

    #[test]
    fn keyed_document_with_mismatched_id() {
        let src = JsonSource::new("unused");
        let err = src.parse_document(json!({"100": {"id": "999"}})).unwrap_err();
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn bad_path_and_bad_ids() {
        let src = JsonSource::new("unused").with_path_keys(vec!["nope".into()]);
        assert!(src.parse_document(json!({"accounts": []})).is_err());

        let src = JsonSource::new("unused");
        assert!(src.parse_document(json!([{"id": 100}])).is_err());
        assert!(src.parse_document(json!([{"name": "x"}])).is_err());
        assert!(src.parse_document(json!("accounts")).is_err());
    }

    #[test]
    fn attribute_filters() {
        let doc = json!([{"acct": "1", "env": "prod", "owner": "ops", "cost": 1.5}]);

        let src = JsonSource::new("unused")
            .with_id_attr("acct")
            .with_include_attrs(vec!["env".into(), "cost".into()]);
        let pool = src.parse_document(doc.clone()).unwrap();
        let keys: Vec<_> = pool[0].metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, ["acct", "cost", "env"]);

        let src = JsonSource::new("unused")
            .with_id_attr("acct")
            .with_exclude_attrs(vec!["owner".into()]);
        assert!(src.parse_document(doc.clone()).unwrap()[0].get("owner").is_none());

        let src = JsonSource::new("unused")
            .with_id_attr("acct")
            .with_exclude_attrs(vec!["acct".into()]);
        assert!(src.parse_document(doc).is_err());
    }

    #[tokio::test]
    async fn loads_file_and_persists_cache() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("accounts.json");
        let cache = dir.path().join("cache.json");
        std::fs::write(&file, r#"[{"id": "1", "env": "prod"}]"#).unwrap();

        let src = JsonSource::new(&file).with_cache(&cache, Duration::from_secs(300));
        assert_eq!(ids(&src.load_pool().await.unwrap()), ["1"]);
        assert!(cache.exists());

        // served from the cache even after the source file changes
        std::fs::write(&file, r#"[{"id": "2"}]"#).unwrap();
        assert_eq!(ids(&src.load_pool().await.unwrap()), ["1"]);
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let src = JsonSource::new("/definitely/not/here.json");
        assert!(matches!(src.load_pool().await, Err(SourceError::Read { .. })));
    }
}
