//! State manager (C10)
//!
//! A single natural-language document made of `## Section` blocks, mutated
//! under one mutex (spec §4.10, §5 "State commits are serialized"). Writes
//! asynchronously persist to storage; persistence failures are recorded but
//! never roll back the in-memory value (spec §4.10).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pondkeep_storage::Storage;
use tracing::warn;

struct Document {
    text: String,
    updated_at: DateTime<Utc>,
}

/// What changed, for the dispatcher's notification fan-out (spec §4.10,
/// §4.9 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Replaced,
    Appended,
}

pub struct StateManager {
    document: Mutex<Document>,
    storage: Arc<dyn Storage>,
}

impl StateManager {
    pub fn new(bootstrap: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            document: Mutex::new(Document {
                text: bootstrap.into(),
                updated_at: Utc::now(),
            }),
            storage,
        }
    }

    pub fn get(&self) -> String {
        self.document.lock().text.clone()
    }

    /// Replace the whole document. Last write wins if called concurrently
    /// (spec §3 "last-write-wins for concurrent replacements").
    pub async fn replace(&self, new_value: String) -> StateChange {
        {
            let mut document = self.document.lock();
            document.text = new_value;
            document.updated_at = Utc::now();
        }
        self.persist().await;
        StateChange::Replaced
    }

    /// Insert `content` immediately after the `## <section>` header, before
    /// the next `## ` header (or at end if there is none). Creates the
    /// section at the end of the document if it does not already exist.
    ///
    /// No deduplication against identical prior content — see
    /// `DESIGN.md`'s open-question decision.
    pub async fn append(&self, section: &str, content: &str) -> StateChange {
        {
            let mut document = self.document.lock();
            document.text = append_to_section(&document.text, section, content);
            document.updated_at = Utc::now();
        }
        self.persist().await;
        StateChange::Appended
    }

    async fn persist(&self) {
        let text = self.get();
        if let Err(error) = self.storage.update_state(&text).await {
            warn!(%error, "state write-back to storage failed; in-memory state unchanged by this failure");
        }
    }
}

fn append_to_section(document: &str, section: &str, content: &str) -> String {
    let header = format!("## {section}");
    let lines: Vec<&str> = document.lines().collect();

    let Some(header_idx) = lines.iter().position(|line| *line == header) else {
        let mut result = document.to_string();
        if !result.is_empty() && !result.ends_with('\n') {
            result.push('\n');
        }
        result.push_str(&header);
        result.push('\n');
        result.push_str(content);
        result.push('\n');
        return result;
    };

    let next_header_idx = lines
        .iter()
        .enumerate()
        .skip(header_idx + 1)
        .find(|(_, line)| line.starts_with("## "))
        .map(|(idx, _)| idx);

    let insert_at = next_header_idx.unwrap_or(lines.len());
    let mut result_lines: Vec<&str> = lines[..insert_at].to_vec();
    let owned_content;
    if !content.is_empty() {
        owned_content = content.to_string();
        result_lines.push(&owned_content);
    }
    result_lines.extend_from_slice(&lines[insert_at..]);
    let mut joined = result_lines.join("\n");
    if document.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use pondkeep_storage::InMemoryStorage;

    fn manager(bootstrap: &str) -> StateManager {
        StateManager::new(bootstrap, Arc::new(InMemoryStorage::new(bootstrap)))
    }

    #[tokio::test]
    async fn replace_round_trips() {
        let manager = manager("## 現在の状態\n");
        manager.replace("## 現在の状態\nall clear".to_string()).await;
        assert_eq!(manager.get(), "## 現在の状態\nall clear");
    }

    #[tokio::test]
    async fn append_to_existing_section_inserts_before_next_header() {
        let manager = manager("## A\nfirst\n## B\nsecond\n");
        manager.append("A", "inserted").await;
        assert_eq!(manager.get(), "## A\nfirst\ninserted\n## B\nsecond\n");
    }

    #[tokio::test]
    async fn append_to_missing_section_creates_it_at_end() {
        let manager = manager("## A\nfirst\n");
        manager.append("B", "new content").await;
        assert_eq!(manager.get(), "## A\nfirst\n## B\nnew content\n");
    }

    #[tokio::test]
    async fn append_empty_content_is_a_no_op() {
        let manager = manager("## A\nfirst\n## B\nsecond\n");
        let before = manager.get();
        manager.append("A", "").await;
        assert_eq!(manager.get(), before);
    }
}
