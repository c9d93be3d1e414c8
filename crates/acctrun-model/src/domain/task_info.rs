use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{AccountId, TaskIndex, TaskStatus};

/// Live view of one per-account task inside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Account the task processes.
    pub account: AccountId,
    /// Position in the selection order.
    pub index: TaskIndex,
    /// Current execution state.
    pub status: TaskStatus,
    /// Number of credential acquisition attempts made so far.
    pub attempt: u32,
    /// When the task was queued.
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
    /// When the task last changed state.
    #[serde(with = "time_serde")]
    pub updated_at: SystemTime,
    /// Last error message (if the task failed, timed out or was cancelled).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}
