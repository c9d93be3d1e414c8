use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving which accounts a run targets.
///
/// All of them are fatal and surface before any account is processed.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("no such account(s): {}", .0.join(", "))]
    UnknownAccounts(Vec<String>),
    #[error("invalid filter '{expr}': {reason}")]
    InvalidPredicate { expr: String, reason: String },
    #[error("invalid regex in filter '{expr}': {source}")]
    InvalidRegex {
        expr: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised by an account source while loading the pool.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot read accounts from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed account document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid account document: {0}")]
    Invalid(String),
    #[error("account cache: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(String),
    #[error("cached value is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e.to_string())
    }
}
