//! Workflow registry (C3)
//!
//! Grounded on the teacher's `WorkflowRegistry` (`durable/src/engine/registry.rs`),
//! which stores boxed factory closures keyed by workflow type name. This
//! registry stores whole [`WorkflowDefinition`]s keyed by name instead,
//! since there is no per-workflow concrete Rust type to erase here —
//! workflows are declared, not implemented as distinct structs.

use std::collections::HashMap;

use pondkeep_contracts::EventKind;

use crate::definition::WorkflowDefinition;
use crate::error::EngineError;

pub struct WorkflowRegistry {
    by_name: HashMap<String, WorkflowDefinition>,
    /// Registration order, preserved independently of the hash map so
    /// `by_kind` and `list` can return deterministic order (spec §8
    /// property 9).
    order: Vec<String>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<(), EngineError> {
        if self.by_name.contains_key(&definition.name) {
            return Err(EngineError::DuplicateName(definition.name));
        }
        self.order.push(definition.name.clone());
        self.by_name.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.by_name.get(name)
    }

    pub fn list(&self) -> Vec<&WorkflowDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Definitions whose trigger set includes `kind`, in registration
    /// order. The resolver (C4) applies its own priority ordering on top
    /// of this.
    pub fn by_kind(&self, kind: EventKind) -> Vec<&WorkflowDefinition> {
        self.list()
            .into_iter()
            .filter(|def| def.triggers.event_kinds.contains(&kind))
            .collect()
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("names", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Triggers;
    use pondkeep_contracts::WorkflowResult;

    fn noop_definition(name: &str, kind: EventKind) -> WorkflowDefinition {
        WorkflowDefinition::new(name, "", Triggers::on([kind]), |_event, _ctx| {
            Box::pin(async { WorkflowResult::success() })
        })
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = WorkflowRegistry::new();
        registry
            .register(noop_definition("a", EventKind::IssueCreated))
            .unwrap();
        let result = registry.register(noop_definition("a", EventKind::IssueCreated));
        assert!(matches!(result, Err(EngineError::DuplicateName(_))));
    }

    #[test]
    fn by_kind_returns_registration_order() {
        let mut registry = WorkflowRegistry::new();
        registry
            .register(noop_definition("b", EventKind::IssueCreated))
            .unwrap();
        registry
            .register(noop_definition("a", EventKind::IssueCreated))
            .unwrap();
        registry
            .register(noop_definition("c", EventKind::FlowCreated))
            .unwrap();

        let names: Vec<_> = registry
            .by_kind(EventKind::IssueCreated)
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn get_and_list_reflect_registered_definitions() {
        let mut registry = WorkflowRegistry::new();
        registry
            .register(noop_definition("solo", EventKind::IssueCreated))
            .unwrap();
        assert!(registry.get("solo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.list().len(), 1);
    }
}
