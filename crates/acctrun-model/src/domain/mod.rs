mod account_id;
pub use account_id::AccountId;

mod meta_value;
pub use meta_value::MetaValue;

mod account;
pub use account::Account;

mod task_status;
pub use task_status::TaskStatus;

mod task_info;
pub use task_info::TaskInfo;

mod task_error;
pub use task_error::{CredentialFault, Failure, TaskError};

mod outcome;
pub use outcome::Outcome;

mod summary;
pub use summary::RunSummary;

/// Zero-based position of an account in the selection order.
///
/// Outcomes carry it so that results can be put back in selection order after completing in any order.
pub type TaskIndex = usize;

/// Timeout value in milliseconds.
pub type TimeoutMs = u64;
