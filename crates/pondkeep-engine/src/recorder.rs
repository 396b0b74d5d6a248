//! Per-execution recorder (C5)

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use pondkeep_contracts::{Record, RecordKind};

/// An append-only buffer for one execution's structured log. Sequence
/// numbers are monotonic within this recorder and meaningless across
/// executions (spec §5).
///
/// The recorder has no knowledge of where it is ultimately persisted —
/// flushing to storage is the executor's (C8) job at finalization.
pub struct Recorder {
    records: Mutex<Vec<Record>>,
    next_seq: AtomicU64,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn record(&self, kind: RecordKind, payload: serde_json::Value) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.records.lock().push(Record {
            seq,
            kind,
            timestamp: Utc::now(),
            payload,
        });
    }

    /// A consistent copy of everything recorded so far, in sequence order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.lock().clone()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seq_numbers_are_monotonic() {
        let recorder = Recorder::new();
        recorder.record(RecordKind::Input, json!({}));
        recorder.record(RecordKind::Output, json!({}));
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot[0].seq, 0);
        assert_eq!(snapshot[1].seq, 1);
    }

    #[test]
    fn snapshot_preserves_order() {
        let recorder = Recorder::new();
        for i in 0..5 {
            recorder.record(RecordKind::Info, json!({ "i": i }));
        }
        let snapshot = recorder.snapshot();
        let values: Vec<_> = snapshot.iter().map(|r| r.payload["i"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }
}
