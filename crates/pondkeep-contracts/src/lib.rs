//! Shared types for the pondkeep workflow engine
//!
//! This crate has no dependency on the engine itself; it exists so that the
//! engine, the storage facade, and driver implementations all speak the same
//! event, error, and record vocabulary without a circular dependency.

mod event;
mod record;
mod result;

pub use event::{Event, EventKind, Priority};
pub use record::{Record, RecordKind};
pub use result::{ContextUpdate, ErrorRecord, WorkflowResult};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ContextUpdate, ErrorRecord, Event, EventKind, Priority, Record, RecordKind,
        WorkflowResult,
    };
}
