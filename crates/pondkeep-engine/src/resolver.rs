//! Trigger resolver (C4)
//!
//! Pure and synchronous by contract (spec §4.4): no I/O, no side effects,
//! runs on the dispatcher's hot path. The only side effect it is allowed
//! is appending a `warn` record to the *system* recorder when a workflow's
//! condition panics — that failure must not prevent other workflows from
//! being resolved.

use pondkeep_contracts::{Event, RecordKind};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::recorder::Recorder;
use crate::registry::WorkflowRegistry;
use crate::definition::WorkflowDefinition;

/// Resolve `event` against `registry`, returning the ordered list of
/// workflows that should run. `system_recorder` receives a `warn` record
/// for every condition that panics; the corresponding workflow is treated
/// as not matching (spec §4.4 step 2).
pub fn resolve<'a>(
    event: &Event,
    registry: &'a WorkflowRegistry,
    system_recorder: &Recorder,
) -> Vec<&'a WorkflowDefinition> {
    let mut matches: Vec<&WorkflowDefinition> = registry
        .by_kind(event.kind)
        .into_iter()
        .filter(|definition| condition_holds(definition, event, system_recorder))
        .collect();

    matches.sort_by(|a, b| b.triggers.priority_hint.cmp(&a.triggers.priority_hint));
    matches
}

fn condition_holds(definition: &WorkflowDefinition, event: &Event, system_recorder: &Recorder) -> bool {
    let Some(condition) = &definition.triggers.condition else {
        return true;
    };
    match catch_unwind(AssertUnwindSafe(|| condition(event))) {
        Ok(result) => result,
        Err(_) => {
            system_recorder.record(
                RecordKind::Warn,
                serde_json::json!({
                    "workflow": definition.name,
                    "reason": "condition panicked; treated as false",
                }),
            );
            false
        }
    }
}
