use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use tracing::debug;

use acctrun_model::{AccountId, RunPhase, TaskIndex, TaskInfo, TaskStatus};

/// Live per-account task state of one run.
///
/// Shared between the runner and any [`crate::RunHandle`]; cloning is cheap.
#[derive(Clone)]
pub struct RunState {
    inner: Arc<RwLock<RunStateInner>>,
}

struct RunStateInner {
    /// Tasks indexed by selection position.
    tasks: Vec<TaskInfo>,
    /// Index: account id -> selection position.
    by_account: HashMap<AccountId, TaskIndex>,
    phase: RunPhase,
}

impl RunState {
    /// Create empty run state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RunStateInner {
                tasks: Vec::new(),
                by_account: HashMap::new(),
                phase: RunPhase::Idle,
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RunStateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RunStateInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the next selected account as a pending task and return its index.
    pub fn add_task(&self, account: AccountId) -> TaskIndex {
        let mut inner = self.write();

        let now = SystemTime::now();
        let index = inner.tasks.len();
        inner.tasks.push(TaskInfo {
            account: account.clone(),
            index,
            status: TaskStatus::Pending,
            attempt: 0,
            created_at: now,
            updated_at: now,
            error: None,
        });
        inner.by_account.insert(account, index);
        index
    }

    /// Move a task forward.
    ///
    /// Returns `false` and leaves the task untouched when the move would go backwards or leave a terminal state.
    pub fn update_status(&self, index: TaskIndex, status: TaskStatus, error: Option<String>) -> bool {
        let mut inner = self.write();

        let Some(info) = inner.tasks.get_mut(index) else {
            return false;
        };
        if !info.status.can_transition_to(status) {
            debug!(account = %info.account, from = %info.status, to = %status, "ignored task transition");
            return false;
        }
        info.status = status;
        info.updated_at = SystemTime::now();
        if let Some(err) = error {
            info.error = Some(err);
        }
        true
    }

    /// Count one more credential attempt.
    pub fn increment_attempt(&self, index: TaskIndex) {
        let mut inner = self.write();

        if let Some(info) = inner.tasks.get_mut(index) {
            info.attempt += 1;
            info.updated_at = SystemTime::now();
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.read().phase
    }

    /// Advance the run phase; backward moves are ignored.
    pub fn set_phase(&self, phase: RunPhase) -> bool {
        let mut inner = self.write();
        if !inner.phase.can_advance_to(phase) {
            return false;
        }
        inner.phase = phase;
        true
    }

    pub fn get(&self, index: TaskIndex) -> Option<TaskInfo> {
        self.read().tasks.get(index).cloned()
    }

    pub fn get_by_account(&self, account: &AccountId) -> Option<TaskInfo> {
        let inner = self.read();
        inner
            .by_account
            .get(account)
            .and_then(|i| inner.tasks.get(*i).cloned())
    }

    /// All tasks in selection order.
    pub fn list_all(&self) -> Vec<TaskInfo> {
        self.read().tasks.clone()
    }

    pub fn list_by_status(&self, status: TaskStatus) -> Vec<TaskInfo> {
        self.read()
            .tasks
            .iter()
            .filter(|info| info.status == status)
            .cloned()
            .collect()
    }

    /// Tasks currently owned by a worker.
    pub fn in_flight(&self) -> usize {
        self.read().tasks.iter().filter(|t| t.status.is_in_flight()).count()
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(ids: &[&str]) -> RunState {
        let state = RunState::new();
        for id in ids {
            state.add_task(AccountId::from(*id));
        }
        state
    }

    #[test]
    fn add_and_get_task() {
        let state = state_with(&["100", "200"]);

        let info = state.get(1).expect("task should exist");
        assert_eq!(info.account, AccountId::from("200"));
        assert_eq!(info.index, 1);
        assert_eq!(info.status, TaskStatus::Pending);
        assert_eq!(info.attempt, 0);
        assert!(info.error.is_none());

        let by_id = state.get_by_account(&AccountId::from("100")).unwrap();
        assert_eq!(by_id.index, 0);
        assert!(state.get(7).is_none());
    }

    #[test]
    fn transitions_only_move_forward() {
        let state = state_with(&["100"]);

        assert!(state.update_status(0, TaskStatus::AcquiringCredentials, None));
        assert!(state.update_status(0, TaskStatus::Executing, None));
        assert!(!state.update_status(0, TaskStatus::Pending, None));
        assert!(state.update_status(0, TaskStatus::Failed, Some("boom".into())));
        assert!(!state.update_status(0, TaskStatus::Succeeded, None));

        let info = state.get(0).unwrap();
        assert_eq!(info.status, TaskStatus::Failed);
        assert_eq!(info.error.as_deref(), Some("boom"));
    }

    #[test]
    fn pending_can_be_cancelled_directly() {
        let state = state_with(&["100"]);
        assert!(state.update_status(0, TaskStatus::Cancelled, None));
        assert!(!state.update_status(0, TaskStatus::AcquiringCredentials, None));
    }

    #[test]
    fn attempts_and_in_flight() {
        let state = state_with(&["100", "200", "300"]);
        state.update_status(0, TaskStatus::AcquiringCredentials, None);
        state.increment_attempt(0);
        state.increment_attempt(0);
        state.update_status(1, TaskStatus::AcquiringCredentials, None);
        state.update_status(1, TaskStatus::Executing, None);

        assert_eq!(state.get(0).unwrap().attempt, 2);
        assert_eq!(state.in_flight(), 2);
        assert_eq!(state.list_by_status(TaskStatus::Pending).len(), 1);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn phase_advances_only() {
        let state = RunState::new();
        assert_eq!(state.phase(), RunPhase::Idle);
        assert!(state.set_phase(RunPhase::Running));
        assert!(state.set_phase(RunPhase::Completed));
        assert!(!state.set_phase(RunPhase::Draining));
        assert_eq!(state.phase(), RunPhase::Completed);
    }
}
