use std::{sync::Arc, time::SystemTime};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

use acctrun_model::{AccountId, TaskIndex};

mod kind;
pub use kind::EventKind;

/// Something that happened during a run.
///
/// Optional fields are filled depending on [`EventKind`].
#[derive(Debug, Clone)]
pub struct RunEvent {
    pub kind: EventKind,
    pub run_id: Uuid,
    pub at: SystemTime,
    pub account: Option<AccountId>,
    pub index: Option<TaskIndex>,
    pub attempt: Option<u32>,
    pub delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub reason: Option<String>,
}

impl RunEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            run_id: Uuid::nil(),
            at: SystemTime::now(),
            account: None,
            index: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    pub fn with_task(mut self, account: &AccountId, index: TaskIndex) -> Self {
        self.account = Some(account.clone());
        self.index = Some(index);
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Receives run events on its own queue.
///
/// A slow subscriber never blocks the run: when its queue is full, events for it are dropped.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &RunEvent);

    fn name(&self) -> &'static str;

    fn queue_capacity(&self) -> usize {
        1024
    }
}

/// Fans events out to subscriber workers.
#[derive(Clone)]
pub(crate) struct Bus {
    run_id: Uuid,
    queues: Arc<Vec<(&'static str, mpsc::Sender<Arc<RunEvent>>)>>,
}

impl Bus {
    pub(crate) fn spawn(run_id: Uuid, subscribers: &[Arc<dyn Subscribe>]) -> (Self, Vec<JoinHandle<()>>) {
        let mut queues = Vec::with_capacity(subscribers.len());
        let mut workers = Vec::with_capacity(subscribers.len());

        for sub in subscribers {
            let (tx, mut rx) = mpsc::channel::<Arc<RunEvent>>(sub.queue_capacity().max(1));
            let sub = Arc::clone(sub);
            queues.push((sub.name(), tx));
            workers.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    sub.on_event(&event).await;
                }
            }));
        }

        let bus = Self {
            run_id,
            queues: Arc::new(queues),
        };
        (bus, workers)
    }

    pub(crate) fn publish(&self, mut event: RunEvent) {
        if self.queues.is_empty() {
            return;
        }
        event.run_id = self.run_id;
        let event = Arc::new(event);

        for (name, tx) in self.queues.iter() {
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = name, kind = %event.kind, "event dropped for a subscriber (queue full)");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber = name, kind = %event.kind, "event dropped for a subscriber (worker closed)");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &RunEvent) {
            self.0.lock().unwrap().push(event.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn events_reach_subscribers_in_order_with_run_id() {
        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        let run_id = Uuid::new_v4();
        let (bus, workers) = Bus::spawn(run_id, &[rec.clone() as Arc<dyn Subscribe>]);

        bus.publish(RunEvent::new(EventKind::RunStarted));
        bus.publish(RunEvent::new(EventKind::TaskStarting).with_task(&AccountId::from("1"), 0));
        drop(bus);
        for w in workers {
            w.await.unwrap();
        }

        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![EventKind::RunStarted, EventKind::TaskStarting]
        );
    }

    #[test]
    fn builder_fills_optional_fields() {
        let e = RunEvent::new(EventKind::BackoffScheduled)
            .with_task(&AccountId::from("9"), 3)
            .with_attempt(2)
            .with_delay_ms(400)
            .with_reason("throttled");
        assert_eq!(e.index, Some(3));
        assert_eq!(e.attempt, Some(2));
        assert_eq!(e.delay_ms, Some(400));
        assert_eq!(e.reason.as_deref(), Some("throttled"));
    }
}
