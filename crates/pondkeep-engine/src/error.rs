//! Unified engine error taxonomy (spec §7)

use thiserror::Error;

/// Every way the engine can fail. The engine never retries on any of
/// these — it records and continues; see each variant's propagation note.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Raised by `enqueue_event_by_kind` when the wire-form string falls
    /// outside the closed taxonomy. Surfaced to the caller.
    #[error("unknown event kind: {0}")]
    BadEventKind(String),

    /// Raised by `enqueue` against a bounded, full queue. Surfaced to the
    /// caller; producers are expected to back off.
    #[error("queue is at capacity ({0})")]
    BufferFull(usize),

    /// Raised by the driver selector when no factory satisfies the
    /// required capability tags. Surfaced to the executor; that execution
    /// fails.
    #[error("no driver satisfies required tags: {0:?}")]
    NoSuitableDriver(Vec<String>),

    /// Raised by a driver call. Surfaced to the workflow body; the
    /// workflow decides whether to treat it as fatal.
    #[error("driver call failed: {0}")]
    DriverError(#[source] anyhow::Error),

    /// Raised by the storage facade. Surfaced to the workflow body.
    #[error("storage call failed: {0}")]
    StorageError(#[from] pondkeep_storage::StorageError),

    /// A workflow body panicked during `invoke`. The executor constructs
    /// this to render the `ErrorRecord` detail, then converts it into
    /// `WorkflowResult { success: false, .. }` rather than propagating it —
    /// the dispatcher continues with the next event regardless.
    #[error("workflow threw: {0}")]
    WorkflowThrown(String),

    /// A per-workflow soft timeout elapsed before completion. Constructed
    /// by the executor the same way as `WorkflowThrown`.
    #[error("workflow timed out after {0:?}")]
    WorkflowTimeout(std::time::Duration),

    /// The engine was asked to do something (enqueue, dispatch) while not
    /// in the `running` state.
    #[error("engine is not running")]
    NotRunning,

    /// `WorkflowRegistry::register` was called twice with the same name.
    #[error("workflow already registered: {0}")]
    DuplicateName(String),
}
