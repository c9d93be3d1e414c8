use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use acctrun_model::{Account, MetaValue};

use crate::SelectionError;

/// How the right-hand side of `key=value` filters is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PredicateMode {
    /// Comma separated list of values, any of which may match.
    #[default]
    Exact,
    /// A regular expression searched in the value's text form.
    Regex,
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Matches when the metadata value equals any listed value.
    AnyOf(Vec<MetaValue>),
    /// Matches when the pattern is found in the metadata value.
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, value: &MetaValue) -> bool {
        match self {
            Matcher::AnyOf(values) => values.iter().any(|v| v.loosely_eq(value)),
            Matcher::Pattern(re) => !value.is_null() && re.is_match(&value.to_string()),
        }
    }
}

/// A single `key=value` metadata test.
///
/// Keys are compared case-insensitively. An account without the key never matches, whatever the matcher.
#[derive(Debug, Clone)]
pub struct Predicate {
    key: String,
    matcher: Matcher,
}

impl Predicate {
    pub fn new(key: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            key: key.into(),
            matcher,
        }
    }

    /// Match one exact value.
    pub fn exact(key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        Self::new(key, Matcher::AnyOf(vec![value.into()]))
    }

    /// Match a regular expression; the pattern is compiled here, once.
    pub fn regex(key: impl Into<String>, pattern: &str) -> Result<Self, SelectionError> {
        let key = key.into();
        let re = Regex::new(pattern).map_err(|source| SelectionError::InvalidRegex {
            expr: format!("{key}={pattern}"),
            source,
        })?;
        Ok(Self::new(key, Matcher::Pattern(re)))
    }

    /// Parse a `key=value` expression.
    ///
    /// In [`PredicateMode::Exact`] the value is a comma separated list, optionally prefixed with a cast:
    /// `region=us-east-1,us-west-2`, `tier=int:1,2`, `active=bool:yes`.
    /// In [`PredicateMode::Regex`] everything after the first `=` is the pattern.
    pub fn parse(expr: &str, mode: PredicateMode) -> Result<Self, SelectionError> {
        let invalid = |reason: &str| SelectionError::InvalidPredicate {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let (key, value) = expr
            .split_once('=')
            .ok_or_else(|| invalid("expected key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        if value.is_empty() {
            return Err(invalid("empty value"));
        }

        match mode {
            PredicateMode::Regex => Self::regex(key, value),
            PredicateMode::Exact => {
                let (cast, list) = split_cast(value);
                if list.is_empty() {
                    return Err(invalid("empty value"));
                }
                let values = list
                    .split(',')
                    .map(|v| cast.apply(v.trim()).map_err(|reason| invalid(&reason)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(key, Matcher::AnyOf(values)))
            }
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn matches(&self, account: &Account) -> bool {
        account
            .get(&self.key)
            .is_some_and(|value| self.matcher.matches(value))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            Matcher::AnyOf(values) => {
                write!(f, "{}=", self.key)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            Matcher::Pattern(re) => write!(f, "{}=/{}/", self.key, re.as_str()),
        }
    }
}

/// Predicates that must all hold (AND). Several groups are OR-ed by the caller.
#[derive(Debug, Clone, Default)]
pub struct FilterGroup {
    predicates: Vec<Predicate>,
}

impl FilterGroup {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    pub fn parse<S: AsRef<str>>(exprs: &[S], mode: PredicateMode) -> Result<Self, SelectionError> {
        let predicates = exprs
            .iter()
            .map(|e| Predicate::parse(e.as_ref(), mode))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { predicates })
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// An empty group matches nothing; it carries no intent to select.
    pub fn matches(&self, account: &Account) -> bool {
        !self.predicates.is_empty() && self.predicates.iter().all(|p| p.matches(account))
    }
}

#[derive(Debug, Clone, Copy)]
enum Cast {
    Str,
    Int,
    Float,
    Bool,
}

impl Cast {
    fn apply(self, raw: &str) -> Result<MetaValue, String> {
        match self {
            Cast::Str => Ok(MetaValue::Str(raw.to_string())),
            Cast::Int => raw
                .parse::<i64>()
                .map(MetaValue::Int)
                .map_err(|e| format!("'{raw}' is not an int: {e}")),
            Cast::Float => raw
                .parse::<f64>()
                .map(MetaValue::Float)
                .map_err(|e| format!("'{raw}' is not a float: {e}")),
            Cast::Bool => Ok(MetaValue::Bool(matches!(
                raw.to_ascii_lowercase().as_str(),
                "y" | "yes" | "true" | "1"
            ))),
        }
    }
}

fn split_cast(value: &str) -> (Cast, &str) {
    for (prefix, cast) in [
        ("str:", Cast::Str),
        ("int:", Cast::Int),
        ("float:", Cast::Float),
        ("bool:", Cast::Bool),
    ] {
        if let Some(rest) = value.strip_prefix(prefix) {
            return (cast, rest);
        }
    }
    (Cast::Str, value)
}
