//! Account selection: which accounts a run targets.
//!
//! An [`AccountSource`] loads the pool once per run, [`select`] applies [`SelectionCriteria`] to it and returns a deterministic, duplicate-free ordering.
pub mod error;
pub use error::{CacheError, SelectionError, SourceError};

mod predicate;
pub use predicate::{FilterGroup, Matcher, Predicate, PredicateMode};

mod criteria;
pub use criteria::{SelectionConfig, SelectionCriteria, WhenUnfiltered};

mod select;
pub use select::{attributes, select, values_of};

pub mod cache;
pub use cache::PersistentCache;

pub mod source;
pub use source::{AccountSource, IdentitySource, JsonSource, SourceConfig, StaticSource, build_source};
