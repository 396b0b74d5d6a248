//! In-memory [`Storage`] implementation for engine tests and standalone runs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::{Flow, Issue, Knowledge, PondEntry, Schedule};
use crate::store::{LogBatch, Storage, StorageError};

/// `HashMap`-backed reference implementation of [`Storage`].
///
/// `search_*` does naive case-insensitive substring matching against a
/// couple of text fields per record type; it stands in for the external
/// vector/relational engine's real semantic search and is not meant to be
/// used as a production backend.
pub struct InMemoryStorage {
    issues: RwLock<HashMap<Uuid, Issue>>,
    flows: RwLock<HashMap<Uuid, Flow>>,
    knowledge: RwLock<HashMap<Uuid, Knowledge>>,
    pond: RwLock<Vec<PondEntry>>,
    schedules: RwLock<HashMap<Uuid, Schedule>>,
    state: RwLock<String>,
    logs: RwLock<Vec<LogBatch>>,
}

impl InMemoryStorage {
    pub fn new(initial_state: impl Into<String>) -> Self {
        Self {
            issues: RwLock::new(HashMap::new()),
            flows: RwLock::new(HashMap::new()),
            knowledge: RwLock::new(HashMap::new()),
            pond: RwLock::new(Vec::new()),
            schedules: RwLock::new(HashMap::new()),
            state: RwLock::new(initial_state.into()),
            logs: RwLock::new(Vec::new()),
        }
    }

    /// Number of log batches recorded so far. Exposed for test assertions.
    pub fn log_count(&self) -> usize {
        self.logs.read().len()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn apply_patch(
    mut value: serde_json::Value,
    patch: serde_json::Value,
) -> Result<serde_json::Value, StorageError> {
    let (serde_json::Value::Object(target), serde_json::Value::Object(fields)) =
        (&mut value, patch)
    else {
        return Err(StorageError::InvalidPatch(
            "patch must be a JSON object".into(),
        ));
    };
    for (key, val) in fields {
        target.insert(key, val);
    }
    Ok(value)
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_issue(&self, id: Uuid) -> Result<Option<Issue>, StorageError> {
        Ok(self.issues.read().get(&id).cloned())
    }

    async fn create_issue(&self, issue: Issue) -> Result<Issue, StorageError> {
        self.issues.write().insert(issue.id, issue.clone());
        Ok(issue)
    }

    async fn update_issue(
        &self,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Issue, StorageError> {
        let mut issues = self.issues.write();
        let current = issues
            .get(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let merged = apply_patch(serde_json::to_value(current).unwrap(), patch)?;
        let mut updated: Issue = serde_json::from_value(merged)
            .map_err(|e| StorageError::InvalidPatch(e.to_string()))?;
        updated.updated_at = Utc::now();
        issues.insert(id, updated.clone());
        Ok(updated)
    }

    async fn search_issues(&self, query: &str) -> Result<Vec<Issue>, StorageError> {
        Ok(self
            .issues
            .read()
            .values()
            .filter(|i| contains_ci(&i.title, query) || contains_ci(&i.description, query))
            .cloned()
            .collect())
    }

    async fn get_flow(&self, id: Uuid) -> Result<Option<Flow>, StorageError> {
        Ok(self.flows.read().get(&id).cloned())
    }

    async fn create_flow(&self, flow: Flow) -> Result<Flow, StorageError> {
        self.flows.write().insert(flow.id, flow.clone());
        Ok(flow)
    }

    async fn update_flow(&self, id: Uuid, patch: serde_json::Value) -> Result<Flow, StorageError> {
        let mut flows = self.flows.write();
        let current = flows
            .get(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let merged = apply_patch(serde_json::to_value(current).unwrap(), patch)?;
        let mut updated: Flow = serde_json::from_value(merged)
            .map_err(|e| StorageError::InvalidPatch(e.to_string()))?;
        updated.updated_at = Utc::now();
        flows.insert(id, updated.clone());
        Ok(updated)
    }

    async fn search_flows(&self, query: &str) -> Result<Vec<Flow>, StorageError> {
        Ok(self
            .flows
            .read()
            .values()
            .filter(|f| contains_ci(&f.name, query) || contains_ci(&f.description, query))
            .cloned()
            .collect())
    }

    async fn get_knowledge(&self, id: Uuid) -> Result<Option<Knowledge>, StorageError> {
        Ok(self.knowledge.read().get(&id).cloned())
    }

    async fn create_knowledge(&self, knowledge: Knowledge) -> Result<Knowledge, StorageError> {
        self.knowledge.write().insert(knowledge.id, knowledge.clone());
        Ok(knowledge)
    }

    async fn update_knowledge(
        &self,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Knowledge, StorageError> {
        let mut knowledge = self.knowledge.write();
        let current = knowledge
            .get(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let merged = apply_patch(serde_json::to_value(current).unwrap(), patch)?;
        let mut updated: Knowledge = serde_json::from_value(merged)
            .map_err(|e| StorageError::InvalidPatch(e.to_string()))?;
        updated.updated_at = Utc::now();
        knowledge.insert(id, updated.clone());
        Ok(updated)
    }

    async fn search_knowledge(&self, query: &str) -> Result<Vec<Knowledge>, StorageError> {
        Ok(self
            .knowledge
            .read()
            .values()
            .filter(|k| contains_ci(&k.title, query) || contains_ci(&k.body, query))
            .cloned()
            .collect())
    }

    async fn add_pond_entry(&self, entry: PondEntry) -> Result<PondEntry, StorageError> {
        self.pond.write().push(entry.clone());
        Ok(entry)
    }

    async fn search_pond(&self, query: &str) -> Result<Vec<PondEntry>, StorageError> {
        Ok(self
            .pond
            .read()
            .iter()
            .filter(|e| contains_ci(&e.content, query) || contains_ci(&e.source, query))
            .cloned()
            .collect())
    }

    async fn get_pond_sources(&self) -> Result<Vec<String>, StorageError> {
        let mut sources: Vec<String> = self
            .pond
            .read()
            .iter()
            .map(|e| e.source.clone())
            .collect();
        sources.sort();
        sources.dedup();
        Ok(sources)
    }

    async fn get_state(&self) -> Result<String, StorageError> {
        Ok(self.state.read().clone())
    }

    async fn update_state(&self, text: &str) -> Result<(), StorageError> {
        *self.state.write() = text.to_string();
        Ok(())
    }

    async fn record_log(&self, batch: LogBatch) -> Result<(), StorageError> {
        self.logs.write().push(batch);
        Ok(())
    }

    async fn add_schedule(&self, schedule: Schedule) -> Result<Schedule, StorageError> {
        self.schedules.write().insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Schedule, StorageError> {
        let mut schedules = self.schedules.write();
        let current = schedules
            .get(&id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let merged = apply_patch(serde_json::to_value(current).unwrap(), patch)?;
        let updated: Schedule = serde_json::from_value(merged)
            .map_err(|e| StorageError::InvalidPatch(e.to_string()))?;
        schedules.insert(id, updated.clone());
        Ok(updated)
    }

    async fn search_schedules(&self, query: &str) -> Result<Vec<Schedule>, StorageError> {
        Ok(self
            .schedules
            .read()
            .values()
            .filter(|s| contains_ci(&s.name, query))
            .cloned()
            .collect())
    }

    async fn is_ready(&self) -> bool {
        true
    }
}
