//! Workflow context (C7)
//!
//! Built fresh per execution and passed by value — no global singletons
//! (spec §9 "Context as a value bundle"). `state` is a snapshot string, not
//! a live reference, so a workflow can never see another execution's
//! in-flight mutation.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use pondkeep_contracts::{Event, Priority};
use pondkeep_storage::Storage;

use crate::driver::{Driver, DriverCriteria, DriverFactory};
use crate::error::EngineError;
use crate::recorder::Recorder;

/// The subset of storage operations a workflow body may call. The engine
/// permits create/update/search for issues, flows, and knowledge plus pond
/// append — no schema mutation (spec §4.7).
pub struct StorageHandle {
    inner: Arc<dyn Storage>,
}

impl StorageHandle {
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self { inner }
    }
}

impl std::ops::Deref for StorageHandle {
    type Target = dyn Storage;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

/// Looks up a driver by capability criteria and instantiates it, closing
/// over the engine's [`DriverRegistry`](crate::driver::DriverRegistry).
#[derive(Clone)]
pub struct DriverFactoryHandle {
    factories: Arc<Vec<Arc<dyn DriverFactory>>>,
}

impl DriverFactoryHandle {
    pub fn new(factories: Arc<Vec<Arc<dyn DriverFactory>>>) -> Self {
        Self { factories }
    }

    pub fn select(&self, criteria: &DriverCriteria) -> Result<Arc<dyn Driver>, EngineError> {
        let mut best: Option<(usize, &Arc<dyn DriverFactory>)> = None;
        for factory in self.factories.iter() {
            let tags = factory.tags();
            if !criteria.required.iter().all(|t| tags.contains(t)) {
                continue;
            }
            let score = criteria.preferred.iter().filter(|t| tags.contains(*t)).count();
            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, factory)),
            }
        }
        best.map(|(_, factory)| factory.create())
            .ok_or_else(|| EngineError::NoSuitableDriver(criteria.required.clone()))
    }
}

/// Buffers emissions made during one execution. Entries only become
/// queue-visible when `flush` is called by the executor (C8) after a
/// successful commit (spec §4.7, §4.8, §5).
pub struct StagingEmitter {
    source_depth: u32,
    staged: Mutex<Vec<Event>>,
}

impl StagingEmitter {
    pub fn new(source_depth: u32) -> Self {
        Self {
            source_depth,
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Stage an event for emission. The emitted event inherits
    /// `source_depth + 1`, bounding self-trigger recursion
    /// (spec §4.8.1, `max_emission_depth`).
    pub fn emit(&self, kind: pondkeep_contracts::EventKind, payload: serde_json::Value, priority: Priority) {
        let event = pondkeep_contracts::Event {
            id: uuid::Uuid::now_v7(),
            kind,
            payload,
            priority,
            enqueued_at: 0,
            attempt: 0,
            depth: self.source_depth + 1,
        };
        self.staged.lock().push(event);
    }

    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut self.staged.lock())
    }
}

/// The per-execution bundle handed to a workflow's executor function.
pub struct Context {
    /// State snapshot as of execution start. Value semantics: mutating
    /// this field has no effect on the engine's shared document.
    pub state: String,
    pub storage: Arc<StorageHandle>,
    pub driver_factory: DriverFactoryHandle,
    pub recorder: Arc<Recorder>,
    pub emitter: Arc<StagingEmitter>,
    pub metadata: HashSet<String>,
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            storage: self.storage.clone(),
            driver_factory: self.driver_factory.clone(),
            recorder: self.recorder.clone(),
            emitter: self.emitter.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl Context {
    pub fn emit(&self, kind: pondkeep_contracts::EventKind, payload: serde_json::Value, priority: Priority) {
        self.emitter.emit(kind, payload, priority);
    }
}
