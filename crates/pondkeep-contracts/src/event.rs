//! Event model and taxonomy (C1)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dispatch priority. Ordering is strict: `High` drains before `Normal` before `Low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// The closed set of event kinds the engine knows how to route.
///
/// Unknown kinds never reach this enum: a string-taking producer boundary
/// (`Dispatcher::enqueue_event_by_kind`) calls `parse` and rejects anything
/// outside the taxonomy with `EngineError::BadEventKind` before an `Event`
/// is constructed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    UserRequestReceived,
    DataArrived,
    IssueCreated,
    IssueUpdated,
    IssueStatusChanged,
    FlowCreated,
    FlowUpdated,
    FlowStatusChanged,
    KnowledgeCreated,
    KnowledgeExtractable,
    PatternFound,
    HighPriorityIssueDetected,
    HighPriorityFlowDetected,
    PerspectiveTriggered,
    ScheduleTriggered,
    PondCapacityWarning,
    IdleTimeDetected,
    SystemMaintenanceDue,
}

impl EventKind {
    /// All recognized kinds, in the order declared by the taxonomy.
    pub const ALL: &'static [EventKind] = &[
        EventKind::UserRequestReceived,
        EventKind::DataArrived,
        EventKind::IssueCreated,
        EventKind::IssueUpdated,
        EventKind::IssueStatusChanged,
        EventKind::FlowCreated,
        EventKind::FlowUpdated,
        EventKind::FlowStatusChanged,
        EventKind::KnowledgeCreated,
        EventKind::KnowledgeExtractable,
        EventKind::PatternFound,
        EventKind::HighPriorityIssueDetected,
        EventKind::HighPriorityFlowDetected,
        EventKind::PerspectiveTriggered,
        EventKind::ScheduleTriggered,
        EventKind::PondCapacityWarning,
        EventKind::IdleTimeDetected,
        EventKind::SystemMaintenanceDue,
    ];

    /// Parse a kind from its wire form (e.g. `"issue-created"`), the same
    /// spelling producers use when enqueuing. Returns `None` for anything
    /// outside the closed taxonomy; callers map that to `BadEventKind`.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == raw)
    }

    /// The wire form of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRequestReceived => "user-request-received",
            Self::DataArrived => "data-arrived",
            Self::IssueCreated => "issue-created",
            Self::IssueUpdated => "issue-updated",
            Self::IssueStatusChanged => "issue-status-changed",
            Self::FlowCreated => "flow-created",
            Self::FlowUpdated => "flow-updated",
            Self::FlowStatusChanged => "flow-status-changed",
            Self::KnowledgeCreated => "knowledge-created",
            Self::KnowledgeExtractable => "knowledge-extractable",
            Self::PatternFound => "pattern-found",
            Self::HighPriorityIssueDetected => "high-priority-issue-detected",
            Self::HighPriorityFlowDetected => "high-priority-flow-detected",
            Self::PerspectiveTriggered => "perspective-triggered",
            Self::ScheduleTriggered => "schedule-triggered",
            Self::PondCapacityWarning => "pond-capacity-warning",
            Self::IdleTimeDetected => "idle-time-detected",
            Self::SystemMaintenanceDue => "system-maintenance-due",
        }
    }
}

/// A queued unit of work: a tagged kind, an opaque payload, and the
/// bookkeeping the dispatcher needs to order and bound it.
///
/// `payload` shape is determined by `kind` but is never validated by the
/// engine itself — a workflow that reads a missing field is responsible for
/// handling that itself (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub priority: Priority,
    /// Per-producer monotonic sequence stamped at enqueue time. See
    /// `DESIGN.md` for why this is not wall-clock.
    pub enqueued_at: u64,
    pub attempt: u32,
    /// Recursion depth: 0 for producer-originated events, `parent + 1` for
    /// events emitted from within a workflow execution. Bounds self-trigger
    /// recursion (`max_emission_depth`).
    pub depth: u32,
}

impl Event {
    /// Construct a root (producer-originated) event with `depth = 0` and
    /// `attempt = 0`. `enqueued_at` is stamped by the queue on `enqueue`.
    pub fn new(kind: EventKind, payload: serde_json::Value, priority: Priority) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            payload,
            priority,
            enqueued_at: 0,
            attempt: 0,
            depth: 0,
        }
    }

    /// Derive an event emitted from within an execution of `self`, inheriting
    /// `depth + 1`. Used by the staging emitter (C7) when a workflow emits.
    pub fn derive(&self, kind: EventKind, payload: serde_json::Value, priority: Priority) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            payload,
            priority,
            enqueued_at: 0,
            attempt: 0,
            depth: self.depth + 1,
        }
    }
}
