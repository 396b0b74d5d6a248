//! Dispatcher (C9) — the engine loop
//!
//! Grounded on the teacher's `WorkerPool::start`/`shutdown`
//! (`durable/src/worker/pool.rs`): a counting semaphore bounds concurrent
//! executions, a `tokio::sync::watch` channel broadcasts the shutdown
//! signal, and `stop` polls outstanding permits against a deadline rather
//! than forcibly cancelling in-flight work.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify, Semaphore};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::context::DriverFactoryHandle;
use crate::error::EngineError;
use crate::executor::{ExecutionOutcome, Executor};
use crate::queue::EventQueue;
use crate::recorder::Recorder;
use crate::registry::WorkflowRegistry;
use crate::resolver;
use crate::state::StateManager;
use pondkeep_contracts::{Event, EventKind, Priority};
use pondkeep_storage::Storage;

/// A one-way notification about an event's progress through the
/// dispatcher. Subscribers must not block (spec §9 "Observability").
#[derive(Debug, Clone)]
pub enum DispatchNotification {
    EventQueued { event_id: uuid::Uuid },
    EventProcessing { event_id: uuid::Uuid, workflow: String },
    EventProcessed { event_id: uuid::Uuid, workflow: String, success: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherStatus {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("dispatcher already running")]
    AlreadyRunning,
    #[error("shutdown timed out with executions still in flight")]
    ShutdownTimeout,
}

/// Owns the queue, registry, executor, and the single logical scheduler
/// loop that ties them together (spec §4.9).
pub struct Dispatcher {
    queue: Arc<EventQueue>,
    registry: Arc<WorkflowRegistry>,
    state: Arc<StateManager>,
    executor: Arc<Executor>,
    config: Arc<EngineConfig>,
    system_recorder: Arc<Recorder>,

    status: parking_lot::RwLock<DispatcherStatus>,
    active: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    wake: Arc<Notify>,
    notify_tx: tokio::sync::broadcast::Sender<DispatchNotification>,
    loop_handle: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<EventQueue>,
        registry: Arc<WorkflowRegistry>,
        state: Arc<StateManager>,
        storage: Arc<dyn Storage>,
        driver_factory: DriverFactoryHandle,
        config: Arc<EngineConfig>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (notify_tx, _) = tokio::sync::broadcast::channel(256);
        let executor = Arc::new(Executor::new(
            state.clone(),
            storage,
            driver_factory,
            queue.clone(),
            config.clone(),
        ));
        Self {
            active: Arc::new(Semaphore::new(config.max_concurrency)),
            queue,
            registry,
            state,
            executor,
            config,
            system_recorder: Arc::new(Recorder::new()),
            status: parking_lot::RwLock::new(DispatcherStatus::Stopped),
            shutdown_tx,
            shutdown_rx,
            wake: Arc::new(Notify::new()),
            notify_tx,
            loop_handle: parking_lot::Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DispatchNotification> {
        self.notify_tx.subscribe()
    }

    pub fn status(&self) -> DispatcherStatus {
        *self.status.read()
    }

    /// Submit an event from an external producer (spec §6.1). Fails with
    /// `NotRunning` unless the dispatcher is accepting new work, or
    /// `BufferFull` if the queue is bounded and full.
    pub fn enqueue_event(
        &self,
        kind: EventKind,
        payload: serde_json::Value,
        priority: Priority,
    ) -> Result<uuid::Uuid, EngineError> {
        if *self.status.read() != DispatcherStatus::Running {
            return Err(EngineError::NotRunning);
        }
        let event = Event::new(kind, payload, priority);
        let id = event.id;
        self.queue.enqueue(event)?;
        let _ = self.notify_tx.send(DispatchNotification::EventQueued { event_id: id });
        self.wake.notify_one();
        Ok(id)
    }

    /// Submit an event by its wire-form kind string (spec §4.1, §6.1) —
    /// the boundary `EventKind::parse`'s own doc comment refers to.
    /// Producers outside this crate (an ingestion surface, a CLI) speak
    /// strings; anything outside the closed taxonomy is rejected here with
    /// `BadEventKind` before an `Event` is ever constructed.
    pub fn enqueue_event_by_kind(
        &self,
        kind: &str,
        payload: serde_json::Value,
        priority: Priority,
    ) -> Result<uuid::Uuid, EngineError> {
        let kind = EventKind::parse(kind).ok_or_else(|| EngineError::BadEventKind(kind.to_string()))?;
        self.enqueue_event(kind, payload, priority)
    }

    /// Start the dispatch loop as a background task.
    #[instrument(skip(self))]
    pub fn start(self: &Arc<Self>) -> Result<(), DispatcherError> {
        {
            let mut status = self.status.write();
            if *status == DispatcherStatus::Running {
                return Err(DispatcherError::AlreadyRunning);
            }
            *status = DispatcherStatus::Running;
        }

        let dispatcher = self.clone();
        let handle = tokio::spawn(async move { dispatcher.run_loop().await });
        *self.loop_handle.lock() = Some(handle);
        info!(max_concurrency = self.config.max_concurrency, "dispatcher started");
        Ok(())
    }

    async fn run_loop(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let Some(event) = self.queue.dequeue() else {
                tokio::select! {
                    _ = self.wake.notified() => continue,
                    _ = shutdown_rx.changed() => continue,
                    _ = tokio::time::sleep(Duration::from_millis(200)) => continue,
                }
            };

            let resolved: Vec<_> = resolver::resolve(&event, &self.registry, &self.system_recorder)
                .into_iter()
                .cloned()
                .collect();

            // Snapshot once per dequeued event, not once per spawned task:
            // every workflow fanned out from this event must observe the
            // identical state document "as of the moment the event was
            // dequeued" (spec §4.9, scenario S3), regardless of what other
            // commits land while these tasks are scheduled.
            let snapshot = self.state.get();

            for definition in resolved {
                let permit = match self.active.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let executor = self.executor.clone();
                let notify_tx = self.notify_tx.clone();
                let event = event.clone();
                let snapshot = snapshot.clone();
                let workflow_name = definition.name.clone();
                let _ = notify_tx.send(DispatchNotification::EventProcessing {
                    event_id: event.id,
                    workflow: workflow_name.clone(),
                });

                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome: ExecutionOutcome =
                        executor.run(event.clone(), &definition, snapshot).await;
                    let _ = notify_tx.send(DispatchNotification::EventProcessed {
                        event_id: event.id,
                        workflow: outcome.workflow_name.clone(),
                        success: outcome.result.success,
                    });
                });
            }
        }
        debug!("dispatch loop exited");
    }

    /// Stop accepting new dispatch, drain in-flight executions up to
    /// `drain_timeout`, then return (spec §4.9 "Shutdown").
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), DispatcherError> {
        {
            let mut status = self.status.write();
            if *status == DispatcherStatus::Stopped {
                return Ok(());
            }
            *status = DispatcherStatus::Draining;
        }
        let _ = self.shutdown_tx.send(true);
        self.wake.notify_waiters();

        let deadline = tokio::time::Instant::now() + self.config.drain_timeout;
        loop {
            if self.active.available_permits() == self.config.max_concurrency {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("drain timeout reached with executions still in flight");
                return Err(DispatcherError::ShutdownTimeout);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
        *self.status.write() = DispatcherStatus::Stopped;
        info!("dispatcher stopped");
        Ok(())
    }

    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Triggers;
    use crate::WorkflowDefinition;
    use parking_lot::Mutex as SyncMutex;
    use pondkeep_contracts::{Event, WorkflowResult};
    use pondkeep_storage::InMemoryStorage;
    use serde_json::json;
    use std::time::Duration as StdDuration;

    const BOOTSTRAP: &str = "## 現在の状態\n";

    fn build_dispatcher(registry: WorkflowRegistry, max_concurrency: usize) -> Arc<Dispatcher> {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new(BOOTSTRAP));
        let state = Arc::new(StateManager::new(BOOTSTRAP, storage.clone()));
        let queue = Arc::new(EventQueue::new(None));
        let driver_factory = DriverFactoryHandle::new(Arc::new(Vec::new()));
        let config = Arc::new(EngineConfig {
            max_concurrency,
            ..EngineConfig::default()
        });
        Arc::new(Dispatcher::new(
            queue,
            Arc::new(registry),
            state,
            storage,
            driver_factory,
            config,
        ))
    }

    /// Subscribes and collects `event:processed` notifications until `n`
    /// have arrived or the deadline elapses.
    async fn collect_processed(
        mut rx: tokio::sync::broadcast::Receiver<DispatchNotification>,
        n: usize,
    ) -> Vec<(String, bool)> {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + StdDuration::from_secs(5);
        while seen.len() < n && tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(StdDuration::from_millis(200), rx.recv()).await {
                Ok(Ok(DispatchNotification::EventProcessed { workflow, success, .. })) => {
                    seen.push((workflow, success));
                }
                Ok(Ok(_)) => continue,
                Ok(Err(_)) => break,
                Err(_) => continue,
            }
        }
        seen
    }

    // S1 — simple dispatch: one workflow, no condition, exactly one
    // execution, recorder captures input and output.
    #[tokio::test]
    async fn s1_simple_dispatch_runs_exactly_once() {
        let mut registry = WorkflowRegistry::new();
        registry
            .register(WorkflowDefinition::new(
                "greeter",
                "",
                Triggers::on([EventKind::IssueCreated]),
                |_event, _ctx| Box::pin(async { WorkflowResult::success() }),
            ))
            .unwrap();

        let dispatcher = build_dispatcher(registry, 4);
        let rx = dispatcher.subscribe();
        dispatcher.start().unwrap();

        dispatcher
            .enqueue_event(EventKind::IssueCreated, json!({ "content": "hello" }), Priority::Normal)
            .unwrap();

        let processed = collect_processed(rx, 1).await;
        assert_eq!(processed, vec![("greeter".to_string(), true)]);

        dispatcher.stop().await.unwrap();
    }

    // S2 — priority: with max_concurrency = 1, the high-priority event's
    // execution completes before the low-priority event's execution starts,
    // even though the low-priority event was enqueued first.
    #[tokio::test]
    async fn s2_high_priority_completes_before_earlier_low_priority() {
        let order: Arc<SyncMutex<Vec<String>>> = Arc::new(SyncMutex::new(Vec::new()));

        let order_low = order.clone();
        let order_hi = order.clone();
        let mut registry = WorkflowRegistry::new();
        registry
            .register(WorkflowDefinition::new(
                "worker",
                "",
                Triggers::on([EventKind::IssueCreated]),
                move |event, _ctx| {
                    let order = if event.priority == Priority::High {
                        order_hi.clone()
                    } else {
                        order_low.clone()
                    };
                    let label = if event.priority == Priority::High { "hi" } else { "low" };
                    Box::pin(async move {
                        tokio::time::sleep(StdDuration::from_millis(30)).await;
                        order.lock().push(label.to_string());
                        WorkflowResult::success()
                    })
                },
            ))
            .unwrap();

        let dispatcher = build_dispatcher(registry, 1);
        let rx = dispatcher.subscribe();

        // Push straight onto the queue before the dispatch loop exists, so
        // both events are present at the first dequeue — the ordering
        // guarantee only holds "when both are present at dequeue time"
        // (spec §5). Going through `enqueue_event` here would fail with
        // `NotRunning` since the dispatcher hasn't started yet.
        dispatcher
            .queue
            .enqueue(Event::new(EventKind::IssueCreated, json!({}), Priority::Low))
            .unwrap();
        dispatcher
            .queue
            .enqueue(Event::new(EventKind::IssueCreated, json!({}), Priority::High))
            .unwrap();

        dispatcher.start().unwrap();
        let _processed = collect_processed(rx, 2).await;

        assert_eq!(order.lock().clone(), vec!["hi".to_string(), "low".to_string()]);

        dispatcher.stop().await.unwrap();
    }

    // S3 — fan-out: one event resolves two workflows, both observe the
    // identical state snapshot taken at dequeue time, regardless of a
    // concurrent commit landing from an unrelated event in between.
    #[tokio::test]
    async fn s3_fan_out_shares_one_snapshot_across_concurrent_commits() {
        let seen_a: Arc<SyncMutex<Option<String>>> = Arc::new(SyncMutex::new(None));
        let seen_b: Arc<SyncMutex<Option<String>>> = Arc::new(SyncMutex::new(None));

        let seen_a_inner = seen_a.clone();
        let seen_b_inner = seen_b.clone();

        let mut registry = WorkflowRegistry::new();
        registry
            .register(WorkflowDefinition::new(
                "w_a",
                "",
                Triggers::on([EventKind::IssueCreated]).with_priority_hint(10),
                move |_event, ctx| {
                    let seen = seen_a_inner.clone();
                    Box::pin(async move {
                        tokio::time::sleep(StdDuration::from_millis(40)).await;
                        *seen.lock() = Some(ctx.state.clone());
                        WorkflowResult::success()
                    })
                },
            ))
            .unwrap();
        registry
            .register(WorkflowDefinition::new(
                "w_b",
                "",
                Triggers::on([EventKind::IssueCreated]).with_priority_hint(5),
                move |_event, ctx| {
                    let seen = seen_b_inner.clone();
                    Box::pin(async move {
                        *seen.lock() = Some(ctx.state.clone());
                        WorkflowResult::success()
                    })
                },
            ))
            .unwrap();
        // An unrelated workflow that mutates state as fast as possible, so a
        // snapshot taken inside a spawned task (rather than at dequeue time)
        // would plausibly observe it.
        registry
            .register(WorkflowDefinition::new(
                "mutator",
                "",
                Triggers::on([EventKind::FlowCreated]),
                |_event, _ctx| Box::pin(async { WorkflowResult::success_with_state("## 現在の状態\nmutated") }),
            ))
            .unwrap();

        let dispatcher = build_dispatcher(registry, 4);
        let rx = dispatcher.subscribe();
        dispatcher.start().unwrap();

        dispatcher
            .enqueue_event(EventKind::IssueCreated, json!({}), Priority::Normal)
            .unwrap();
        dispatcher
            .enqueue_event(EventKind::FlowCreated, json!({}), Priority::Normal)
            .unwrap();

        let _processed = collect_processed(rx, 2).await;

        let a = seen_a.lock().clone().expect("w_a ran");
        let b = seen_b.lock().clone().expect("w_b ran");
        assert_eq!(a, b, "both fan-out workflows must see the identical snapshot");
        assert_eq!(a, BOOTSTRAP);

        dispatcher.stop().await.unwrap();
    }

    // S4 — emission visibility: an emission staged by a successful workflow
    // only becomes queue-visible after its event:processed notification,
    // never before.
    #[tokio::test]
    async fn s4_emission_is_invisible_until_processed_notification() {
        let mut registry = WorkflowRegistry::new();
        registry
            .register(WorkflowDefinition::new(
                "emitter",
                "",
                Triggers::on([EventKind::IssueCreated]),
                |_event, ctx| {
                    Box::pin(async move {
                        tokio::time::sleep(StdDuration::from_millis(30)).await;
                        ctx.emit(EventKind::FlowCreated, json!({}), Priority::Normal);
                        WorkflowResult::success()
                    })
                },
            ))
            .unwrap();

        let dispatcher = build_dispatcher(registry, 4);
        let mut rx = dispatcher.subscribe();
        dispatcher.start().unwrap();

        dispatcher
            .enqueue_event(EventKind::IssueCreated, json!({}), Priority::Normal)
            .unwrap();

        loop {
            match rx.recv().await.unwrap() {
                DispatchNotification::EventProcessing { .. } => {
                    assert_eq!(dispatcher.queue_size(), 0, "emission must not be visible before commit");
                }
                DispatchNotification::EventProcessed { .. } => {
                    assert_eq!(dispatcher.queue_size(), 1, "emission must be visible once processed");
                    break;
                }
                DispatchNotification::EventQueued { .. } => continue,
            }
        }

        dispatcher.stop().await.unwrap();
    }

    // S5 — failure isolation: one workflow throwing on its event does not
    // disturb a concurrently running workflow's commit on a different event.
    #[tokio::test]
    async fn s5_failure_on_one_event_does_not_disturb_concurrent_commit() {
        let mut registry = WorkflowRegistry::new();
        registry
            .register(WorkflowDefinition::new(
                "throws",
                "",
                Triggers::on([EventKind::IssueCreated]),
                |_event, _ctx| {
                    Box::pin(async move {
                        tokio::time::sleep(StdDuration::from_millis(10)).await;
                        WorkflowResult::failure(pondkeep_contracts::ErrorRecord::new("boom", "nope"))
                    })
                },
            ))
            .unwrap();
        registry
            .register(WorkflowDefinition::new(
                "commits",
                "",
                Triggers::on([EventKind::FlowCreated]),
                |_event, _ctx| {
                    Box::pin(async move {
                        tokio::time::sleep(StdDuration::from_millis(20)).await;
                        WorkflowResult::success_with_state("## 現在の状態\ncommitted")
                    })
                },
            ))
            .unwrap();

        let dispatcher = build_dispatcher(registry, 4);
        let rx = dispatcher.subscribe();
        dispatcher.start().unwrap();

        dispatcher
            .enqueue_event(EventKind::IssueCreated, json!({}), Priority::Normal)
            .unwrap();
        dispatcher
            .enqueue_event(EventKind::FlowCreated, json!({}), Priority::Normal)
            .unwrap();

        let processed = collect_processed(rx, 2).await;
        let outcomes: std::collections::HashMap<_, _> = processed.into_iter().collect();
        assert_eq!(outcomes.get("throws"), Some(&false));
        assert_eq!(outcomes.get("commits"), Some(&true));

        dispatcher.stop().await.unwrap();
    }

    // Enqueueing by an unknown wire-form kind string is rejected with
    // `BadEventKind` before an `Event` is ever constructed.
    #[tokio::test]
    async fn enqueue_by_kind_rejects_unknown_wire_form() {
        let dispatcher = build_dispatcher(WorkflowRegistry::new(), 1);
        dispatcher.start().unwrap();

        let result = dispatcher.enqueue_event_by_kind("not-a-real-kind", json!({}), Priority::Normal);
        assert!(matches!(result, Err(EngineError::BadEventKind(_))));

        let ok = dispatcher.enqueue_event_by_kind(EventKind::IssueCreated.as_str(), json!({}), Priority::Normal);
        assert!(ok.is_ok());

        dispatcher.stop().await.unwrap();
    }
}
