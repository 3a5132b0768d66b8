//! The upstream task-result channel.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Supplies whatever an upstream task published as its result.
///
/// The scheduler's own result channel is only good for small payloads, so
/// tasks often publish a file path instead of the data itself. The relay
/// treats every pulled value as opaque until it resolves it.
#[cfg_attr(test, mockall::automock)]
pub trait TaskResultChannel: Send + Sync {
    /// Returns the raw value published by `task_name`, if any.
    fn pull(&self, task_name: &str) -> Option<serde_json::Value>;
}

/// A task-result channel backed by a map, used by in-process DAG runners.
#[derive(Debug, Default)]
pub struct InMemoryTaskResults {
    results: RwLock<HashMap<String, serde_json::Value>>,
}

impl InMemoryTaskResults {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of a task, replacing any earlier one.
    pub fn push(&self, task_name: impl Into<String>, value: serde_json::Value) {
        self.results.write().insert(task_name.into(), value);
    }

    /// Returns the number of recorded results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

impl TaskResultChannel for InMemoryTaskResults {
    fn pull(&self, task_name: &str) -> Option<serde_json::Value> {
        self.results.read().get(task_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_pull() {
        let channel = InMemoryTaskResults::new();
        assert!(channel.is_empty());

        channel.push("show_context", serde_json::json!("/tmp/run_first_task.json"));
        channel.push("show_context", serde_json::json!("/tmp/other"));

        assert_eq!(channel.len(), 1);
        assert_eq!(
            channel.pull("show_context"),
            Some(serde_json::json!("/tmp/other"))
        );
        assert_eq!(channel.pull("missing"), None);
    }
}
