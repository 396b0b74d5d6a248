//! Workflow definitions: the engine's unit of scheduling
//!
//! A [`WorkflowDefinition`] is plain data plus two closures (condition,
//! executor) rather than a trait per workflow type — unlike the teacher's
//! `Workflow` trait (one concrete type per workflow, dispatched through
//! `AnyWorkflow` type erasure), this spec's workflows are declared at
//! registration time against a uniform `(Event, Context) -> WorkflowResult`
//! shape, so a closure-holding struct is the more direct translation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use pondkeep_contracts::{Event, EventKind, WorkflowResult};

use crate::context::Context;

pub type WorkflowFuture = BoxFuture<'static, WorkflowResult>;
pub type ExecutorFn = Arc<dyn Fn(Event, Context) -> WorkflowFuture + Send + Sync>;
pub type ConditionFn = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// A workflow's trigger declaration (spec §3 "Workflow definition").
#[derive(Clone)]
pub struct Triggers {
    pub event_kinds: HashSet<EventKind>,
    pub condition: Option<ConditionFn>,
    pub priority_hint: i32,
}

impl Triggers {
    pub fn on(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            event_kinds: kinds.into_iter().collect(),
            condition: None,
            priority_hint: 0,
        }
    }

    pub fn with_condition(mut self, condition: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn with_priority_hint(mut self, priority_hint: i32) -> Self {
        self.priority_hint = priority_hint;
        self
    }
}

/// An immutable, registered unit of scheduling. `executor` is the only
/// mutator the engine ever invokes on a workflow's behalf (spec §3).
#[derive(Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: String,
    pub triggers: Triggers,
    pub executor: ExecutorFn,
    /// Optional per-workflow soft timeout (spec §5 "Cancellation and
    /// timeouts"). `None` means no timeout is enforced.
    pub timeout: Option<Duration>,
}

impl WorkflowDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        triggers: Triggers,
        executor: impl Fn(Event, Context) -> WorkflowFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            triggers,
            executor: Arc::new(executor),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("priority_hint", &self.triggers.priority_hint)
            .field("event_kinds", &self.triggers.event_kinds)
            .finish_non_exhaustive()
    }
}
