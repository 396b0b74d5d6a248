//! Engine lifecycle (C11)

use std::sync::Arc;

use parking_lot::RwLock;
use pondkeep_storage::Storage;
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::context::DriverFactoryHandle;
use crate::dispatcher::{Dispatcher, DispatcherStatus};
use crate::driver::DriverRegistry;
use crate::error::EngineError;
use crate::queue::EventQueue;
use crate::registry::WorkflowRegistry;
use crate::state::StateManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Running,
    Stopping,
    Stopped,
}

/// A synchronous health snapshot (spec §4.11, §6.1).
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub ready: bool,
    pub engine_state: LifecycleState,
    pub storage_ready: bool,
    pub driver_count: usize,
    pub queue_size: usize,
    pub last_error: Option<String>,
}

/// Drives the engine through `uninitialized -> initializing -> ready ->
/// running -> stopping -> stopped` (spec §4.11). Owns the other
/// components' shared handles so callers have one entry point.
pub struct Engine {
    state_slot: RwLock<LifecycleState>,
    last_error: RwLock<Option<String>>,

    storage: Arc<dyn Storage>,
    config: Arc<EngineConfig>,
    registry: Arc<WorkflowRegistry>,
    driver_registry: Arc<DriverRegistry>,
    queue: Arc<EventQueue>,
    state_manager: Option<Arc<StateManager>>,
    dispatcher: RwLock<Option<Arc<Dispatcher>>>,
}

impl Engine {
    pub fn new(
        storage: Arc<dyn Storage>,
        config: EngineConfig,
        registry: WorkflowRegistry,
        driver_registry: DriverRegistry,
    ) -> Self {
        let queue = Arc::new(EventQueue::new(config.queue_capacity));
        Self {
            state_slot: RwLock::new(LifecycleState::Uninitialized),
            last_error: RwLock::new(None),
            storage,
            config: Arc::new(config),
            registry: Arc::new(registry),
            driver_registry: Arc::new(driver_registry),
            queue,
            state_manager: None,
            dispatcher: RwLock::new(None),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state_slot.read()
    }

    /// Connect storage, load bootstrap state, freeze the registries.
    /// Leaves the engine `Uninitialized` with `last_error` set on failure
    /// (spec §4.11).
    #[instrument(skip(self))]
    pub async fn initialize(mut self) -> Result<InitializedEngine, (Self, EngineError)> {
        *self.state_slot.write() = LifecycleState::Initializing;

        if !self.storage.is_ready().await {
            *self.state_slot.write() = LifecycleState::Uninitialized;
            let error = "storage backend reported not ready".to_string();
            *self.last_error.write() = Some(error.clone());
            return Err((self, EngineError::NotRunning));
        }

        let bootstrap = match self.storage.get_state().await {
            Ok(existing) if !existing.is_empty() => existing,
            _ => self.config.state_bootstrap.clone(),
        };
        let state_manager = Arc::new(StateManager::new(bootstrap, self.storage.clone()));
        self.state_manager = Some(state_manager);

        *self.state_slot.write() = LifecycleState::Ready;
        info!("engine initialized");

        Ok(InitializedEngine { inner: self })
    }

    fn driver_factory_handle(&self) -> DriverFactoryHandle {
        // The registry only exposes `select`, but the context needs a
        // value it can clone cheaply per execution; snapshot the factory
        // list once since the registry is frozen after `start`.
        let factories: Vec<_> = self.driver_registry.list_factories();
        DriverFactoryHandle::new(Arc::new(factories))
    }

    pub async fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            ready: self.state() == LifecycleState::Running,
            engine_state: self.state(),
            storage_ready: self.storage.is_ready().await,
            driver_count: self.driver_registry.len(),
            queue_size: self.queue.size(),
            last_error: self.last_error.read().clone(),
        }
    }
}

/// An engine past `initialize`; the only state from which `start` is
/// callable.
pub struct InitializedEngine {
    inner: Engine,
}

impl InitializedEngine {
    #[instrument(skip(self))]
    pub fn start(self) -> Result<RunningEngine, EngineError> {
        if self.inner.state() != LifecycleState::Ready {
            return Err(EngineError::NotRunning);
        }
        let state_manager = self.inner.state_manager.clone().expect("set during initialize");
        let dispatcher = Arc::new(Dispatcher::new(
            self.inner.queue.clone(),
            self.inner.registry.clone(),
            state_manager,
            self.inner.storage.clone(),
            self.inner.driver_factory_handle(),
            self.inner.config.clone(),
        ));
        dispatcher
            .start()
            .map_err(|_| EngineError::NotRunning)?;
        *self.inner.dispatcher.write() = Some(dispatcher.clone());
        *self.inner.state_slot.write() = LifecycleState::Running;
        info!("engine running");
        Ok(RunningEngine {
            inner: self.inner,
            dispatcher,
        })
    }
}

/// A started engine. This is the handle producers enqueue against.
pub struct RunningEngine {
    inner: Engine,
    dispatcher: Arc<Dispatcher>,
}

impl RunningEngine {
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn enqueue_event(
        &self,
        kind: pondkeep_contracts::EventKind,
        payload: serde_json::Value,
        priority: pondkeep_contracts::Priority,
    ) -> Result<uuid::Uuid, EngineError> {
        self.dispatcher.enqueue_event(kind, payload, priority)
    }

    /// Submit an event by its wire-form kind string, for producers that
    /// only have a string (an ingestion surface, a CLI) rather than a
    /// compiled-in `EventKind`. Unknown kinds surface as `BadEventKind`.
    pub fn enqueue_event_by_kind(
        &self,
        kind: &str,
        payload: serde_json::Value,
        priority: pondkeep_contracts::Priority,
    ) -> Result<uuid::Uuid, EngineError> {
        self.dispatcher.enqueue_event_by_kind(kind, payload, priority)
    }

    /// Readiness is true iff running, storage reports ready, and at least
    /// one driver factory is registered (spec §4.11).
    pub async fn is_ready(&self) -> bool {
        self.inner.state() == LifecycleState::Running
            && self.inner.storage.is_ready().await
            && self.inner.driver_registry.len() > 0
    }

    pub async fn health(&self) -> HealthSnapshot {
        self.inner.health().await
    }

    #[instrument(skip(self))]
    pub async fn stop(self) -> Result<Engine, EngineError> {
        *self.inner.state_slot.write() = LifecycleState::Stopping;
        self.dispatcher.stop().await.map_err(|_| EngineError::NotRunning)?;
        *self.inner.state_slot.write() = LifecycleState::Stopped;
        Ok(self.inner)
    }
}
