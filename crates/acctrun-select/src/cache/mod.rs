//! On-disk cache for loaded account pools.
use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info};

use crate::CacheError;

/// A JSON file that is considered fresh for `max_age` after it was written.
///
/// A zero `max_age` disables the cache: nothing is read or written.
#[derive(Debug, Clone)]
pub struct PersistentCache {
    path: PathBuf,
    max_age: Duration,
}

impl PersistentCache {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        !self.max_age.is_zero()
    }

    /// True when the file is missing or older than `max_age`.
    pub fn is_expired(&self) -> bool {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return true;
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .unwrap_or(Duration::MAX);
        age >= self.max_age
    }

    /// Read the cached value if it is still fresh.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, CacheError> {
        if !self.is_enabled() || self.is_expired() {
            return Ok(None);
        }
        debug!(path = %self.path.display(), "loading from cache");
        let bytes = std::fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write the value atomically: a sibling temp file is renamed over the target.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), CacheError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, value)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| CacheError::from(e.error))?;

        info!(path = %self.path.display(), "refreshed data and saved in cache");
        Ok(())
    }
}
