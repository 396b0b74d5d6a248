//! Executor (C8)
//!
//! Grounded on the teacher's `WorkflowExecutor::process_workflow`
//! (`durable/src/engine/executor.rs`): prepare the execution's working set,
//! invoke the workflow body, classify the outcome, then commit or roll
//! back. Unlike the teacher, there is no event-sourced replay here — each
//! run is driven straight from a snapshot, not reconstructed from a log.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use pondkeep_contracts::{Event, RecordKind, WorkflowResult};
use pondkeep_storage::{LogBatch, Storage};
use tracing::instrument;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::context::{Context, DriverFactoryHandle, StagingEmitter, StorageHandle};
use crate::definition::WorkflowDefinition;
use crate::error::EngineError;
use crate::queue::EventQueue;
use crate::recorder::Recorder;
use crate::state::StateManager;

/// What happened when one `(event, workflow)` pair was run. Carried back
/// to the dispatcher for its `event:processed` notification (spec §4.9).
pub struct ExecutionOutcome {
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub result: WorkflowResult,
}

/// Runs one workflow against one event end to end: prepare, invoke,
/// classify, commit or roll back (spec §4.8).
pub struct Executor {
    state: Arc<StateManager>,
    storage: Arc<dyn Storage>,
    driver_factory: DriverFactoryHandle,
    queue: Arc<EventQueue>,
    config: Arc<EngineConfig>,
}

impl Executor {
    pub fn new(
        state: Arc<StateManager>,
        storage: Arc<dyn Storage>,
        driver_factory: DriverFactoryHandle,
        queue: Arc<EventQueue>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            state,
            storage,
            driver_factory,
            queue,
            config,
        }
    }

    /// `snapshot` is the state document as of the moment `event` was
    /// dequeued, taken once by the dispatcher's `run_loop` and passed into
    /// every workflow resolved for that event — never re-fetched here, so
    /// that all fan-out workflows for one event see the identical document
    /// regardless of when their spawned task actually runs (spec §4.9,
    /// scenario S3).
    #[instrument(skip(self, definition, snapshot), fields(workflow = %definition.name, event_id = %event.id))]
    pub async fn run(
        &self,
        event: Event,
        definition: &WorkflowDefinition,
        snapshot: String,
    ) -> ExecutionOutcome {
        let execution_id = Uuid::now_v7();
        let started_at = chrono::Utc::now();
        let recorder = Arc::new(Recorder::new());
        recorder.record(
            RecordKind::Input,
            serde_json::json!({ "event_id": event.id, "kind": event.kind.as_str() }),
        );

        let emitter = Arc::new(StagingEmitter::new(event.depth));
        let context = Context {
            state: snapshot.clone(),
            storage: Arc::new(StorageHandle::new(self.storage.clone())),
            driver_factory: self.driver_factory.clone(),
            recorder: recorder.clone(),
            emitter: emitter.clone(),
            metadata: Default::default(),
        };

        let timeout = definition.timeout.or(self.config.default_workflow_timeout);
        let result = self.invoke(definition, event.clone(), context, timeout).await;

        match &result {
            r if r.success => {
                recorder.record(
                    RecordKind::Output,
                    r.output.clone().unwrap_or(serde_json::Value::Null),
                );
                self.commit(&event, r, &emitter).await;
            }
            r => {
                let error = r.error.clone().unwrap_or_else(|| {
                    pondkeep_contracts::ErrorRecord::new("unknown", "workflow reported failure")
                });
                recorder.record(RecordKind::Error, serde_json::to_value(&error).unwrap());
                // Rollback: staged emissions are simply dropped (never flushed); state untouched.
            }
        }

        let ended_at = chrono::Utc::now();
        let status = if result.success { "success" } else { "failure" };
        if let Err(storage_error) = self
            .storage
            .record_log(LogBatch {
                execution_id,
                workflow_name: definition.name.clone(),
                started_at,
                ended_at,
                status: status.to_string(),
                input: event.payload.clone(),
                output: result.output.clone(),
                records: recorder.snapshot(),
            })
            .await
        {
            tracing::warn!(%storage_error, "failed to persist execution log");
        }

        ExecutionOutcome {
            execution_id,
            workflow_name: definition.name.clone(),
            result,
        }
    }

    async fn invoke(
        &self,
        definition: &WorkflowDefinition,
        event: Event,
        context: Context,
        timeout: Option<Duration>,
    ) -> WorkflowResult {
        let future = AssertUnwindSafe((definition.executor)(event, context)).catch_unwind();

        let outcome = match timeout {
            Some(duration) => match tokio::time::timeout(duration, future).await {
                Ok(result) => result,
                Err(_) => {
                    let error = EngineError::WorkflowTimeout(duration);
                    return WorkflowResult::failure(pondkeep_contracts::ErrorRecord::new(
                        "timeout",
                        error.to_string(),
                    ));
                }
            },
            None => future.await,
        };

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&panic);
                let error = EngineError::WorkflowThrown(message.clone());
                WorkflowResult::failure(
                    pondkeep_contracts::ErrorRecord::new("panic", error.to_string()).with_detail(message),
                )
            }
        }
    }

    async fn commit(&self, event: &Event, result: &WorkflowResult, emitter: &StagingEmitter) {
        if let Some(update) = &result.context_update {
            if let Some(new_state) = &update.state {
                self.state.replace(new_state.clone()).await;
            }
        }

        for staged in emitter.drain() {
            if staged.depth > self.config.max_emission_depth {
                tracing::warn!(
                    event_id = %event.id,
                    depth = staged.depth,
                    "dropping emission past max_emission_depth"
                );
                continue;
            }
            if let Err(EngineError::BufferFull(_)) = self.queue.enqueue(staged) {
                tracing::warn!(event_id = %event.id, "staged emission dropped: queue at capacity");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Triggers;
    use pondkeep_contracts::{EventKind, Priority};
    use pondkeep_storage::InMemoryStorage;
    use serde_json::json;

    fn build_executor() -> (Executor, Arc<EventQueue>, Arc<StateManager>) {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new("## 現在の状態\n"));
        let state = Arc::new(StateManager::new("## 現在の状態\n", storage.clone()));
        let queue = Arc::new(EventQueue::new(None));
        let driver_factory = DriverFactoryHandle::new(Arc::new(Vec::new()));
        let config = Arc::new(EngineConfig::default());
        let executor = Executor::new(state.clone(), storage, driver_factory, queue.clone(), config);
        (executor, queue, state)
    }

    #[tokio::test]
    async fn successful_execution_commits_state_and_flushes_emissions() {
        let (executor, queue, state) = build_executor();
        let definition = WorkflowDefinition::new(
            "promote",
            "",
            Triggers::on([EventKind::IssueCreated]),
            |_event, ctx| {
                Box::pin(async move {
                    ctx.emit(EventKind::FlowCreated, json!({}), Priority::Normal);
                    WorkflowResult::success_with_state("## 現在の状態\nupdated")
                })
            },
        );
        let event = Event::new(EventKind::IssueCreated, json!({}), Priority::Normal);
        let snapshot = state.get();
        let outcome = executor.run(event, &definition, snapshot).await;

        assert!(outcome.result.success);
        assert_eq!(state.get(), "## 現在の状態\nupdated");
        assert_eq!(queue.size(), 1);
    }

    #[tokio::test]
    async fn failed_execution_leaves_state_untouched_and_drops_emissions() {
        let (executor, queue, state) = build_executor();
        let before = state.get();
        let definition = WorkflowDefinition::new(
            "fails",
            "",
            Triggers::on([EventKind::IssueCreated]),
            |_event, ctx| {
                Box::pin(async move {
                    ctx.emit(EventKind::FlowCreated, json!({}), Priority::Normal);
                    WorkflowResult::failure(pondkeep_contracts::ErrorRecord::new("boom", "nope"))
                })
            },
        );
        let event = Event::new(EventKind::IssueCreated, json!({}), Priority::Normal);
        let snapshot = state.get();
        let outcome = executor.run(event, &definition, snapshot).await;

        assert!(!outcome.result.success);
        assert_eq!(state.get(), before);
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn panicking_executor_is_converted_to_failure() {
        let (executor, _queue, state) = build_executor();
        let definition = WorkflowDefinition::new(
            "panics",
            "",
            Triggers::on([EventKind::IssueCreated]),
            |_event, _ctx| Box::pin(async { panic!("kaboom") }),
        );
        let event = Event::new(EventKind::IssueCreated, json!({}), Priority::Normal);
        let snapshot = state.get();
        let outcome = executor.run(event, &definition, snapshot).await;

        assert!(!outcome.result.success);
        assert_eq!(outcome.result.error.unwrap().kind, "panic");
    }

    #[tokio::test]
    async fn emission_past_max_depth_is_dropped_not_whole_commit() {
        let (executor, queue, state) = build_executor();
        let definition = WorkflowDefinition::new(
            "recurses",
            "",
            Triggers::on([EventKind::IssueCreated]),
            |_event, ctx| {
                Box::pin(async move {
                    ctx.emit(EventKind::IssueCreated, json!({}), Priority::Normal);
                    WorkflowResult::success_with_state("advanced")
                })
            },
        );
        let mut event = Event::new(EventKind::IssueCreated, json!({}), Priority::Normal);
        event.depth = 10; // at the default max_emission_depth, so the emission (depth 11) is dropped
        let snapshot = state.get();
        executor.run(event, &definition, snapshot).await;

        assert_eq!(queue.size(), 0);
        assert_eq!(state.get(), "advanced");
    }
}
