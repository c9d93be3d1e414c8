//! Fan one command out across many accounts.
//!
//! The [`Runner`] resolves the selection, then drives credential acquisition and command execution per account on a bounded pool.
//! Every selected account yields exactly one [`acctrun_model::Outcome`], returned in selection order by [`Runner::run`] or streamed by [`Runner::start`].
pub mod error;
pub use error::{CommandError, RunError};

pub mod command;
pub use command::{Command, ExecContext};

pub mod r#fn;
pub use r#fn::FnCommand;

pub mod regional;
pub use regional::{Regional, RegionalCommand, RegionalFnCommand, RegionalOutput, RegionResult};

mod options;
pub use options::{DEFAULT_GRACE_MS, DEFAULT_MAX_CONCURRENCY, RetryPolicy, RunOptions, StreamOrder};

pub mod state;
pub use state::RunState;

pub mod event;
pub use event::{EventKind, RunEvent, Subscribe};

pub mod runner;
pub use runner::{ReorderBuffer, RunHandle, RunReport, Runner};

pub mod prelude {
    pub use crate::error::{CommandError, RunError};
    pub use crate::{
        Command, ExecContext, FnCommand, Regional, RegionalCommand, RegionalFnCommand, RunHandle, RunOptions, RunReport,
        Runner,
    };
    pub use acctrun_model::{Account, AccountId, Outcome, RunSummary, TaskStatus};
}
