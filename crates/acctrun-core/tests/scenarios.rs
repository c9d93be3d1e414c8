use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use acctrun_core::{
    Command, CommandError, EventKind, ExecContext, FnCommand, Regional, RegionalFnCommand, RetryPolicy, RunError,
    RunEvent, RunOptions, Runner, StreamOrder, Subscribe,
};
use acctrun_creds::{CredentialError, CredentialProvider, Credentials, Session, StaticProvider};
use acctrun_model::{
    Account, AccountId, BackoffStrategy, CredentialFault, Outcome, RunPhase, TaskError, TaskStatus,
};
use acctrun_select::{FilterGroup, PredicateMode, SelectionCriteria, StaticSource};

fn pool(n: usize) -> Vec<Account> {
    (0..n)
        .map(|i| Account::new(format!("{}", 100 + i)).with_meta("env", if i % 2 == 0 { "prod" } else { "dev" }))
        .collect()
}

fn ids<T>(outcomes: &[Outcome<T>]) -> Vec<String> {
    outcomes.iter().map(|o| o.account.to_string()).collect()
}

fn provider() -> Arc<dyn CredentialProvider> {
    Arc::new(StaticProvider::new().with_fallback(Credentials::new("key", "secret")))
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, BackoffStrategy::fixed(10))
}

/// Command with per-account delays and failures that tracks how many executions overlap.
#[derive(Default)]
struct Workload {
    delays: HashMap<String, u64>,
    default_delay_ms: u64,
    fail: HashSet<String>,
    panic: HashSet<String>,
    declared: Option<usize>,
    current: AtomicUsize,
    peak: AtomicUsize,
    executed: AtomicUsize,
    pre_hooks: AtomicUsize,
    post_hooks: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl Workload {
    fn new(default_delay_ms: u64) -> Self {
        Self {
            default_delay_ms,
            ..Default::default()
        }
    }

    fn delay(mut self, id: &str, ms: u64) -> Self {
        self.delays.insert(id.to_string(), ms);
        self
    }

    fn failing(mut self, id: &str) -> Self {
        self.fail.insert(id.to_string());
        self
    }

    fn panicking(mut self, id: &str) -> Self {
        self.panic.insert(id.to_string());
        self
    }

    fn declare(mut self, n: usize) -> Self {
        self.declared = Some(n);
        self
    }
}

#[async_trait]
impl Command for Workload {
    type Output = String;

    fn name(&self) -> &str {
        "workload"
    }

    fn declared_max_concurrency(&self) -> Option<std::num::NonZeroUsize> {
        self.declared.and_then(std::num::NonZeroUsize::new)
    }

    async fn pre_hook(&self) -> Result<(), CommandError> {
        self.pre_hooks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, ctx: ExecContext) -> Result<String, CommandError> {
        let id = ctx.account_id().to_string();
        assert_eq!(ctx.session().account(), ctx.account_id());

        self.executed.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let ms = self.delays.get(&id).copied().unwrap_or(self.default_delay_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);

        if self.panic.contains(&id) {
            panic!("workload exploded on {id}");
        }
        if self.fail.contains(&id) {
            return Err(CommandError::failed(format!("access denied in {id}")));
        }
        Ok(format!("ok:{id}"))
    }

    fn on_outcome(&self, outcome: &Outcome<String>) {
        self.seen.lock().unwrap().push(outcome.account.to_string());
    }

    async fn post_hook(&self, outcomes: &[Outcome<String>]) -> Result<(), CommandError> {
        assert_eq!(outcomes.len(), self.seen.lock().unwrap().len());
        self.post_hooks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider that fails each account with a scripted list of faults before succeeding.
struct Scripted {
    faults: Mutex<HashMap<AccountId, VecDeque<CredentialFault>>>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(script: Vec<(&str, Vec<CredentialFault>)>) -> Self {
        let faults = script
            .into_iter()
            .map(|(id, faults)| (AccountId::from(id), faults.into_iter().collect()))
            .collect();
        Self {
            faults: Mutex::new(faults),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialProvider for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn acquire(&self, account: &AccountId) -> Result<Session, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .faults
            .lock()
            .unwrap()
            .get_mut(account)
            .and_then(|q| q.pop_front());
        match next {
            Some(kind) => Err(CredentialError::new(kind, "scripted")),
            None => Ok(Session::new(account.clone(), "scripted", Credentials::new("k", "s"))),
        }
    }
}

#[derive(Default)]
struct Events(Mutex<Vec<RunEvent>>);

impl Events {
    fn kinds(&self) -> Vec<EventKind> {
        self.0.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl Subscribe for Events {
    async fn on_event(&self, event: &RunEvent) {
        self.0.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "events"
    }
}

#[tokio::test(start_paused = true)]
async fn include_group_selects_matching_accounts_in_pool_order() {
    let pool = vec![
        Account::new("A").with_meta("region", "us-east-1"),
        Account::new("B").with_meta("region", "us-west-2"),
        Account::new("C").with_meta("region", "us-east-1"),
    ];
    let criteria =
        SelectionCriteria::new().include(FilterGroup::parse(&["region=us-east-1"], PredicateMode::Exact).unwrap());

    let report = Runner::new(provider())
        .run(Arc::new(Workload::new(1)), &criteria, &pool)
        .await
        .unwrap();
    assert_eq!(ids(&report.outcomes), ["A", "C"]);
}

#[tokio::test(start_paused = true)]
async fn bounded_pool_keeps_selection_order() {
    let command = Arc::new(
        Workload::new(10)
            .delay("100", 50)
            .delay("101", 5)
            .delay("102", 30)
            .delay("103", 1)
            .delay("104", 20),
    );
    let runner = Runner::new(provider()).with_options(RunOptions::default().with_max_concurrency(2));

    let report = runner
        .run(command.clone(), &SelectionCriteria::new(), &pool(5))
        .await
        .unwrap();

    assert!(command.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(command.executed.load(Ordering::SeqCst), 5);
    assert_eq!(ids(&report.outcomes), ["100", "101", "102", "103", "104"]);
    assert!(report.outcomes.iter().enumerate().all(|(i, o)| o.index == i));
    assert_eq!(report.summary.succeeded, 5);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_explicit_id_aborts_before_any_work() {
    let command = Arc::new(Workload::new(1));
    let err = Runner::new(provider())
        .run(command.clone(), &SelectionCriteria::ids(["100", "999"]), &pool(3))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Selection(_)));
    assert_eq!(command.executed.load(Ordering::SeqCst), 0);
    assert_eq!(command.pre_hooks.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn explicit_ids_only_run_in_given_order() {
    let report = Runner::new(provider())
        .run(Arc::new(Workload::new(1)), &SelectionCriteria::ids(["102", "100"]), &pool(3))
        .await
        .unwrap();
    assert_eq!(ids(&report.outcomes), ["102", "100"]);
}

#[tokio::test(start_paused = true)]
async fn transient_credential_faults_are_retried_transparently() {
    let provider = Arc::new(Scripted::new(vec![(
        "100",
        vec![CredentialFault::Transient, CredentialFault::Transient],
    )]));
    let runner = Runner::new(provider.clone()).with_options(RunOptions::default().with_retry(fast_retry(3)));

    let report = runner
        .run(Arc::new(Workload::new(1)), &SelectionCriteria::new(), &pool(1))
        .await
        .unwrap();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status(), TaskStatus::Succeeded);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_at_cap_and_other_faults_are_not_retried() {
    let provider = Arc::new(Scripted::new(vec![
        ("100", vec![CredentialFault::Transient; 5]),
        ("101", vec![CredentialFault::AuthFailure]),
    ]));
    let command = Arc::new(Workload::new(1));
    let runner = Runner::new(provider).with_options(RunOptions::default().with_retry(fast_retry(3)));

    let report = runner
        .run(command.clone(), &SelectionCriteria::new(), &pool(3))
        .await
        .unwrap();

    let transient = &report.outcomes[0];
    assert_eq!(transient.attempts, 3);
    let failure = transient.failure_ref().unwrap();
    assert!(failure.retryable);
    assert!(matches!(
        failure.error,
        TaskError::Credential {
            fault: CredentialFault::Transient,
            ..
        }
    ));

    let denied = &report.outcomes[1];
    assert_eq!(denied.attempts, 1);
    assert!(!denied.failure_ref().unwrap().retryable);

    assert!(report.outcomes[2].is_success());
    assert_eq!(command.executed.load(Ordering::SeqCst), 1);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_and_panicking_commands_are_isolated() {
    let command = Arc::new(Workload::new(5).failing("101").panicking("103"));
    let report = Runner::new(provider())
        .run(command, &SelectionCriteria::new(), &pool(5))
        .await
        .unwrap();

    let statuses: Vec<_> = report.outcomes.iter().map(|o| o.status()).collect();
    assert_eq!(
        statuses,
        [
            TaskStatus::Succeeded,
            TaskStatus::Failed,
            TaskStatus::Succeeded,
            TaskStatus::Failed,
            TaskStatus::Succeeded,
        ]
    );
    match &report.outcomes[1].failure_ref().unwrap().error {
        TaskError::Command { reason } => assert_eq!(reason, "access denied in 101"),
        other => panic!("unexpected: {other:?}"),
    }
    match &report.outcomes[3].failure_ref().unwrap().error {
        TaskError::Command { reason } => assert!(reason.contains("workload exploded on 103"), "{reason}"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!report.outcomes[1].failure_ref().unwrap().retryable);
    assert_eq!(report.summary.failed, 2);
    assert!(!report.cancelled);
}

#[tokio::test(start_paused = true)]
async fn overall_timeout_cancels_pending_and_lets_executing_finish() {
    let command = Arc::new(Workload::new(100));
    let runner = Runner::new(provider()).with_options(
        RunOptions::default()
            .with_max_concurrency(7)
            .with_overall_timeout(Duration::from_millis(50)),
    );

    let report = runner
        .run(command.clone(), &SelectionCriteria::new(), &pool(10))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 10);
    assert!(report.cancelled);
    assert_eq!(report.summary.succeeded, 7);
    assert_eq!(report.summary.cancelled, 3);
    for outcome in &report.outcomes[7..] {
        assert_eq!(outcome.status(), TaskStatus::Cancelled);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.elapsed, Duration::ZERO);
    }
    assert_eq!(command.executed.load(Ordering::SeqCst), 7);
}

#[tokio::test(start_paused = true)]
async fn per_account_timeout_records_timed_out_without_waiting() {
    let command = Arc::new(Workload::new(5).delay("101", 10_000));
    let runner = Runner::new(provider()).with_options(
        RunOptions::default()
            .with_max_concurrency(3)
            .with_per_account_timeout(Duration::from_millis(100)),
    );

    let report = runner
        .run(command, &SelectionCriteria::new(), &pool(3))
        .await
        .unwrap();

    assert_eq!(report.outcomes[1].status(), TaskStatus::TimedOut);
    assert!(matches!(
        report.outcomes[1].failure_ref().unwrap().error,
        TaskError::Timeout { timeout_ms: 100 }
    ));
    assert!(report.outcomes[0].is_success());
    assert!(report.outcomes[2].is_success());
    assert!(report.elapsed < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn command_can_only_lower_concurrency() {
    let lowered = Arc::new(Workload::new(10).declare(1));
    Runner::new(provider())
        .with_options(RunOptions::default().with_max_concurrency(4))
        .run(lowered.clone(), &SelectionCriteria::new(), &pool(4))
        .await
        .unwrap();
    assert_eq!(lowered.peak.load(Ordering::SeqCst), 1);

    let raised = Arc::new(Workload::new(10).declare(50));
    Runner::new(provider())
        .with_options(RunOptions::default().with_max_concurrency(2))
        .run(raised.clone(), &SelectionCriteria::new(), &pool(6))
        .await
        .unwrap();
    assert_eq!(raised.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn invalid_options_and_provider_misconfiguration_are_fatal() {
    let err = Runner::new(provider())
        .with_options(RunOptions::default().with_max_concurrency(0))
        .run(Arc::new(Workload::new(1)), &SelectionCriteria::new(), &pool(2))
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::InvalidOptions(_)));

    let command = Arc::new(Workload::new(1));
    let err = Runner::new(Arc::new(StaticProvider::new()))
        .run(command.clone(), &SelectionCriteria::new(), &pool(2))
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Provider(_)));
    assert_eq!(command.executed.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn hooks_run_once_and_see_every_outcome() {
    let command = Arc::new(Workload::new(3).delay("100", 30));
    Runner::new(provider())
        .run(command.clone(), &SelectionCriteria::new(), &pool(4))
        .await
        .unwrap();

    assert_eq!(command.pre_hooks.load(Ordering::SeqCst), 1);
    assert_eq!(command.post_hooks.load(Ordering::SeqCst), 1);
    let seen = command.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    // completion order: the slow first account reports last
    assert_eq!(seen.last().map(String::as_str), Some("100"));
}

#[tokio::test(start_paused = true)]
async fn streaming_in_completion_and_selection_order() {
    let slow_first = || Arc::new(Workload::new(1).delay("100", 40).delay("101", 20));

    let mut handle = Runner::new(provider())
        .start(slow_first(), &SelectionCriteria::new(), &pool(3))
        .await
        .unwrap();
    let mut streamed = Vec::new();
    while let Some(outcome) = handle.next().await {
        streamed.push(outcome.account.to_string());
    }
    assert_eq!(streamed, ["102", "101", "100"]);
    let report = handle.finish().await.unwrap();
    assert_eq!(ids(&report.outcomes), ["100", "101", "102"]);

    let mut handle = Runner::new(provider())
        .with_options(RunOptions::default().with_stream_order(StreamOrder::Selection))
        .start(slow_first(), &SelectionCriteria::new(), &pool(3))
        .await
        .unwrap();
    let mut streamed = Vec::new();
    while let Some(outcome) = handle.next().await {
        streamed.push(outcome.account.to_string());
    }
    assert_eq!(streamed, ["100", "101", "102"]);
}

#[tokio::test(start_paused = true)]
async fn cancel_marks_pending_and_reports_grace_exceeded() {
    let events = Arc::new(Events::default());
    let command = Arc::new(Workload::new(200));
    let handle = Runner::new(provider())
        .with_options(
            RunOptions::default()
                .with_max_concurrency(2)
                .with_grace(Duration::from_millis(10)),
        )
        .with_subscriber(events.clone())
        .start(command.clone(), &SelectionCriteria::new(), &pool(5))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.phase(), RunPhase::Running);
    let executing = handle
        .snapshot()
        .iter()
        .filter(|t| t.status == TaskStatus::Executing)
        .count();
    assert_eq!(executing, 2);

    handle.cancel();
    let report = handle.finish().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.cancelled, 3);

    let kinds = events.kinds();
    assert_eq!(kinds.first(), Some(&EventKind::RunStarted));
    assert_eq!(kinds.last(), Some(&EventKind::RunCompleted));
    assert!(kinds.contains(&EventKind::CancelRequested));
    assert!(kinds.contains(&EventKind::GraceExceeded));
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::TaskCancelled).count(), 3);
}

#[tokio::test(start_paused = true)]
async fn cooperative_command_observes_cancellation() {
    let command = Arc::new(FnCommand::new("wait", |ctx: ExecContext| async move {
        tokio::select! {
            _ = ctx.cancel_token().cancelled() => Err(CommandError::Cancelled),
            _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(ctx.index()),
        }
    }));
    let handle = Runner::new(provider())
        .start(command, &SelectionCriteria::new(), &pool(2))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    handle.cancel();
    let report = handle.finish().await.unwrap();
    assert_eq!(report.summary.cancelled, 2);
    assert!(report.elapsed < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn errors_after_cancellation_stay_failures() {
    let command = Arc::new(FnCommand::new("flush", |ctx: ExecContext| async move {
        ctx.cancel_token().cancelled().await;
        if ctx.index() == 0 {
            Err::<(), _>(CommandError::failed("flush lost writes"))
        } else {
            Err(CommandError::Cancelled)
        }
    }));
    let handle = Runner::new(provider())
        .start(command, &SelectionCriteria::new(), &pool(2))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    handle.cancel();
    let report = handle.finish().await.unwrap();

    assert_eq!(report.outcomes[0].status(), TaskStatus::Failed);
    match &report.outcomes[0].failure_ref().unwrap().error {
        TaskError::Command { reason } => assert_eq!(reason, "flush lost writes"),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(report.outcomes[1].status(), TaskStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn unprompted_cancelled_error_is_a_failure() {
    let command = Arc::new(FnCommand::new("quitter", |_ctx: ExecContext| async move {
        Err::<(), _>(CommandError::Cancelled)
    }));
    let report = Runner::new(provider())
        .run(command, &SelectionCriteria::new(), &pool(1))
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].status(), TaskStatus::Failed);
    assert!(!report.cancelled);
}

/// Provider that hands out a session for a different account than requested.
struct Misrouting;

#[async_trait]
impl CredentialProvider for Misrouting {
    fn name(&self) -> &'static str {
        "misrouting"
    }

    async fn acquire(&self, _account: &AccountId) -> Result<Session, CredentialError> {
        Ok(Session::new(AccountId::from("999"), "misrouting", Credentials::new("k", "s")))
    }
}

#[tokio::test(start_paused = true)]
async fn session_for_another_account_is_an_auth_failure() {
    let command = Arc::new(Workload::new(1));
    let report = Runner::new(Arc::new(Misrouting))
        .with_options(RunOptions::default().with_retry(fast_retry(3)))
        .run(command.clone(), &SelectionCriteria::new(), &pool(2))
        .await
        .unwrap();

    for outcome in &report.outcomes {
        assert_eq!(outcome.attempts, 1);
        let failure = outcome.failure_ref().unwrap();
        assert!(!failure.retryable);
        match &failure.error {
            TaskError::Credential { fault, reason } => {
                assert_eq!(*fault, CredentialFault::AuthFailure);
                assert!(reason.contains("999"), "{reason}");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
    assert_eq!(command.executed.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_credential_backoff_stops_retrying() {
    let provider = Arc::new(Scripted::new(vec![("100", vec![CredentialFault::Transient; 3])]));
    let command = Arc::new(Workload::new(1));
    let handle = Runner::new(provider.clone())
        .with_options(
            RunOptions::default().with_retry(RetryPolicy::new(3, BackoffStrategy::fixed(10_000))),
        )
        .start(command.clone(), &SelectionCriteria::new(), &pool(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();
    let report = handle.finish().await.unwrap();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status(), TaskStatus::Cancelled);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.elapsed < Duration::from_secs(1));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(command.executed.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn overall_timeout_after_last_outcome_does_not_mark_run_cancelled() {
    let command = Arc::new(Workload::new(50));
    let report = Runner::new(provider())
        .with_options(RunOptions::default().with_overall_timeout(Duration::from_millis(50)))
        .run(command, &SelectionCriteria::new(), &pool(1))
        .await
        .unwrap();

    assert_eq!(report.summary.succeeded, 1);
    assert!(!report.cancelled);
}

#[tokio::test(start_paused = true)]
async fn fn_command_from_source_with_snapshot_after_completion() {
    let source = StaticSource::new(pool(4));
    let command = Arc::new(
        FnCommand::new("key-id", |ctx: ExecContext| async move {
            Ok(ctx.session().credentials().key_id.clone())
        })
        .with_max_concurrency(1),
    );
    let criteria = SelectionCriteria::new().include(FilterGroup::parse(&["env=prod"], PredicateMode::Exact).unwrap());

    let report = Runner::new(provider())
        .run_source(command, &criteria, &source)
        .await
        .unwrap();
    assert_eq!(ids(&report.outcomes), ["100", "102"]);
    assert!(report.outcomes.iter().all(|o| o.value().map(String::as_str) == Some("key")));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["summary"]["succeeded"], 2);
    assert_eq!(json["command"], "key-id");
}

#[tokio::test(start_paused = true)]
async fn empty_selection_completes_with_no_outcomes() {
    let report = Runner::new(provider())
        .run_accounts(Arc::new(Workload::new(1)), Vec::new())
        .await
        .unwrap();
    assert!(report.outcomes.is_empty());
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn regional_command_keeps_region_results_per_account() {
    let active = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicUsize::new(0));
    let (a, o) = (active.clone(), overlap.clone());
    let command = Arc::new(Regional::new(RegionalFnCommand::new(
        "regions",
        ["us-east-1", "eu-west-1"],
        move |ctx: ExecContext, region: String| {
            let (active, overlap) = (a.clone(), o.clone());
            async move {
                let key = format!("{}/{region}", ctx.account_id());
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                overlap.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                if key == "101/eu-west-1" {
                    return Err(CommandError::failed("region disabled"));
                }
                Ok(key)
            }
        },
    )));

    let report = Runner::new(provider())
        .with_options(RunOptions::default().with_max_concurrency(2))
        .run(command, &SelectionCriteria::new(), &pool(2))
        .await
        .unwrap();

    assert_eq!(report.summary.succeeded, 2);
    // accounts overlap, regions of one account never do
    assert_eq!(overlap.load(Ordering::SeqCst), 2);
    let second = report.outcomes[1].value().unwrap();
    assert_eq!(second[0], ("us-east-1".to_string(), Ok("101/us-east-1".to_string())));
    assert_eq!(second[1], ("eu-west-1".to_string(), Err("region disabled".to_string())));
    // both regions on one task, one after the other
    assert!(report.outcomes[0].elapsed >= Duration::from_millis(20));
}

#[tokio::test(start_paused = true)]
async fn regional_command_without_regions_is_rejected() {
    let command = Arc::new(Regional::new(RegionalFnCommand::new(
        "regions",
        Vec::<String>::new(),
        |_ctx: ExecContext, region: String| async move { Ok(region) },
    )));
    let err = Runner::new(provider())
        .run(command, &SelectionCriteria::new(), &pool(2))
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::InvalidArguments(ref m) if m.contains("no regions")), "{err}");
}
