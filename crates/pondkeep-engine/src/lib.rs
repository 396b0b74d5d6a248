//! # Pondkeep Workflow Engine
//!
//! The event-driven dispatcher at the core of the personal information
//! organizer: events are enqueued, resolved to workflow definitions by
//! declared trigger kind and condition, executed against a per-execution
//! context, and their side effects (state mutation, event emission,
//! storage writes) are committed atomically or rolled back on failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//! │ EventQueue │──▶│ Dispatcher│──▶│ resolver  │──▶│ Executor │
//! └────────────┘   └───────────┘   └──────────┘   └────┬─────┘
//!                        ▲                              │
//!                        │            ┌─────────────────┼─────────────┐
//!                        │            ▼                 ▼             ▼
//!                        │     StateManager        DriverRegistry   Storage
//!                        └─────────────────(staged emissions flush on commit)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pondkeep_engine::prelude::*;
//! use pondkeep_storage::InMemoryStorage;
//! use std::sync::Arc;
//!
//! let mut registry = WorkflowRegistry::new();
//! registry.register(WorkflowDefinition::new(
//!     "greet",
//!     "replies to a user request",
//!     Triggers::on([EventKind::UserRequestReceived]),
//!     |_event, _ctx| Box::pin(async { WorkflowResult::success() }),
//! )).unwrap();
//!
//! let storage: Arc<dyn pondkeep_storage::Storage> = Arc::new(InMemoryStorage::new(""));
//! let engine = Engine::new(storage, EngineConfig::default(), registry, DriverRegistry::new());
//! ```

pub mod config;
pub mod context;
pub mod definition;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod queue;
pub mod recorder;
pub mod registry;
pub mod resolver;
pub mod state;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::context::Context;
    pub use crate::definition::{Triggers, WorkflowDefinition};
    pub use crate::dispatcher::{Dispatcher, DispatchNotification, DispatcherStatus};
    pub use crate::driver::{Driver, DriverCriteria, DriverFactory, DriverRegistry};
    pub use crate::error::EngineError;
    pub use crate::lifecycle::{Engine, HealthSnapshot, LifecycleState, RunningEngine};
    pub use crate::queue::EventQueue;
    pub use crate::recorder::Recorder;
    pub use crate::registry::WorkflowRegistry;
    pub use crate::state::StateManager;
    pub use pondkeep_contracts::{Event, EventKind, Priority, WorkflowResult};
}

pub use config::EngineConfig;
pub use context::Context;
pub use definition::{Triggers, WorkflowDefinition};
pub use dispatcher::Dispatcher;
pub use driver::{Driver, DriverCriteria, DriverFactory, DriverRegistry};
pub use error::EngineError;
pub use lifecycle::Engine;
pub use queue::EventQueue;
pub use registry::WorkflowRegistry;
pub use state::StateManager;
