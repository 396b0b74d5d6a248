//! The narrow storage interface the engine is allowed to call (spec §6.2)

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{Flow, Issue, Knowledge, PondEntry, Schedule};

/// Errors surfaced by a [`Storage`] implementation.
///
/// The engine treats all of these identically: wrap as `DriverError`'s
/// sibling `StorageError` at the call site and hand the failure to the
/// workflow body (spec §7 — the engine itself never retries or interprets
/// these).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid patch: {0}")]
    InvalidPatch(String),
}

/// One batch of per-execution log records, written at execution end
/// (spec §6.5).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogBatch {
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub status: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub records: Vec<pondkeep_contracts::Record>,
}

/// The narrow facade the engine is permitted to call against the external
/// storage engine (vector DB + relational tables). No method here forms or
/// exposes SQL; `search_*` queries are opaque strings interpreted entirely
/// by the implementation.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_issue(&self, id: Uuid) -> Result<Option<Issue>, StorageError>;
    async fn create_issue(&self, issue: Issue) -> Result<Issue, StorageError>;
    async fn update_issue(
        &self,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Issue, StorageError>;
    async fn search_issues(&self, query: &str) -> Result<Vec<Issue>, StorageError>;

    async fn get_flow(&self, id: Uuid) -> Result<Option<Flow>, StorageError>;
    async fn create_flow(&self, flow: Flow) -> Result<Flow, StorageError>;
    async fn update_flow(&self, id: Uuid, patch: serde_json::Value) -> Result<Flow, StorageError>;
    async fn search_flows(&self, query: &str) -> Result<Vec<Flow>, StorageError>;

    async fn get_knowledge(&self, id: Uuid) -> Result<Option<Knowledge>, StorageError>;
    async fn create_knowledge(&self, knowledge: Knowledge) -> Result<Knowledge, StorageError>;
    async fn update_knowledge(
        &self,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Knowledge, StorageError>;
    async fn search_knowledge(&self, query: &str) -> Result<Vec<Knowledge>, StorageError>;

    async fn add_pond_entry(&self, entry: PondEntry) -> Result<PondEntry, StorageError>;
    async fn search_pond(&self, query: &str) -> Result<Vec<PondEntry>, StorageError>;
    async fn get_pond_sources(&self) -> Result<Vec<String>, StorageError>;

    async fn get_state(&self) -> Result<String, StorageError>;
    async fn update_state(&self, text: &str) -> Result<(), StorageError>;

    async fn record_log(&self, batch: LogBatch) -> Result<(), StorageError>;

    async fn add_schedule(&self, schedule: Schedule) -> Result<Schedule, StorageError>;
    async fn update_schedule(
        &self,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Schedule, StorageError>;
    async fn search_schedules(&self, query: &str) -> Result<Vec<Schedule>, StorageError>;

    /// Synchronous-in-spirit readiness probe; part of the health snapshot
    /// the engine lifecycle (C11) exposes (spec §4.11, §6.1).
    async fn is_ready(&self) -> bool;
}
