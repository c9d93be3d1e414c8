use std::fmt;

use serde::{Deserialize, Serialize};

/// A single metadata value attached to an account.
///
/// Account metadata is loaded from loosely typed documents, so values are small scalars.
/// Missing keys are normalised to [`MetaValue::Null`] by the account sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    pub fn is_null(&self) -> bool {
        matches!(self, MetaValue::Null)
    }

    /// Compare two values the way filter predicates do.
    ///
    /// Integers and floats compare numerically; every other pair must have the same variant.
    pub fn loosely_eq(&self, other: &MetaValue) -> bool {
        match (self, other) {
            (MetaValue::Int(a), MetaValue::Float(b)) | (MetaValue::Float(b), MetaValue::Int(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Null => Ok(()),
            MetaValue::Bool(v) => write!(f, "{v}"),
            MetaValue::Int(v) => write!(f, "{v}"),
            MetaValue::Float(v) => write!(f, "{v}"),
            MetaValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Str(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Str(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Float(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}
