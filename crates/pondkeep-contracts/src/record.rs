//! Recorder record types (C5)

use serde::{Deserialize, Serialize};

/// The kind of a single recorder entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    Input,
    Info,
    AiCall,
    DbQuery,
    Warn,
    Error,
    Output,
}

/// One entry in a per-execution recorder buffer.
///
/// `seq` is monotonic within one execution (assigned by the recorder) and
/// carries no meaning across executions — spec §5 "across executions they
/// are unordered".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub seq: u64,
    pub kind: RecordKind,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload: serde_json::Value,
}
