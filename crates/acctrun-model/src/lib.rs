//! Plain data shared by every acctrun crate.
//!
//! Nothing in here performs I/O or spawns tasks: accounts and their metadata, per-account task status, outcomes and the retry/backoff knobs are all described as serializable values.
mod domain;
pub use domain::*;

mod kind;
pub use kind::*;
