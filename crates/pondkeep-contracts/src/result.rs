//! Workflow result types

use serde::{Deserialize, Serialize};

/// What a workflow execution wants to change about shared state, if anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextUpdate {
    /// Replacement for the whole state document. Absent means "no change".
    pub state: Option<String>,
}

/// A structured error captured from a failed or thrown execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub kind: String,
    /// Present only when the executor panicked/threw rather than returning
    /// `success: false` on purpose.
    pub detail: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// The value a workflow's executor function returns to the engine's
/// executor component (C8) after running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub context_update: Option<ContextUpdate>,
    pub output: Option<serde_json::Value>,
    pub error: Option<ErrorRecord>,
}

impl WorkflowResult {
    pub fn success() -> Self {
        Self {
            success: true,
            context_update: None,
            output: None,
            error: None,
        }
    }

    pub fn success_with_state(state: impl Into<String>) -> Self {
        Self {
            success: true,
            context_update: Some(ContextUpdate {
                state: Some(state.into()),
            }),
            output: None,
            error: None,
        }
    }

    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn failure(error: ErrorRecord) -> Self {
        Self {
            success: false,
            context_update: None,
            output: None,
            error: Some(error),
        }
    }
}
