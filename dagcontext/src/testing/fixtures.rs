//! Test fixtures for task invocation contexts.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::constants::{context, environment, execution};
use crate::context::DagContext;
use crate::errors::Result;
use crate::relay::{InMemoryTaskResults, TaskResultChannel};

/// Builds the invocation context the scheduler would hand a task.
#[derive(Debug, Default, Clone)]
pub struct TestInvocation {
    /// Trigger payload, exposed to the task as `params`.
    pub params: Map<String, Value>,
    /// Environment settings bundled with the DAG.
    pub environment: Map<String, Value>,
    /// Upstream tasks whose outputs the task loads.
    pub relay_targets: Vec<String>,
}

impl TestInvocation {
    /// Creates an empty invocation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trigger parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Sets the run id.
    #[must_use]
    pub fn with_run_id(self, run_id: impl Into<String>) -> Self {
        self.with_param(execution::SYSTEM_RUN_ID, Value::String(run_id.into()))
    }

    /// Sets the identifiers the run processes.
    #[must_use]
    pub fn with_file_ids<S: AsRef<str>>(self, ids: &[S]) -> Self {
        let ids = ids
            .iter()
            .map(|id| Value::String(id.as_ref().to_string()))
            .collect();
        self.with_param(execution::SYSTEM_FILE_ID, Value::Array(ids))
    }

    /// Adds an environment setting.
    #[must_use]
    pub fn with_environment(mut self, key: impl Into<String>, value: Value) -> Self {
        self.environment.insert(key.into(), value);
        self
    }

    /// Points the temp directory at `path`.
    #[must_use]
    pub fn with_temp_directory(self, path: &Path) -> Self {
        self.with_environment(
            environment::TEMP_DIRECTORY,
            Value::String(path.to_string_lossy().into_owned()),
        )
    }

    /// Adds an upstream task to load.
    #[must_use]
    pub fn with_relay_target(mut self, task_name: impl Into<String>) -> Self {
        self.relay_targets.push(task_name.into());
        self
    }

    /// Builds the invocation context value.
    #[must_use]
    pub fn build(&self) -> Value {
        let mut invocation = Map::new();
        invocation.insert(
            context::TASK_PARAMS.to_string(),
            Value::Object(self.params.clone()),
        );
        invocation.insert(
            environment::ENVIRONMENT_SETTINGS.to_string(),
            Value::Object(self.environment.clone()),
        );
        if !self.relay_targets.is_empty() {
            invocation.insert(
                context::XCOM_TARGET.to_string(),
                Value::Array(
                    self.relay_targets
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                ),
            );
        }
        Value::Object(invocation)
    }

    /// Parses the invocation into a `DagContext`, pulling upstream outputs
    /// from `results`.
    pub fn dag_context(&self, results: &Arc<InMemoryTaskResults>) -> Result<DagContext> {
        let channel: Arc<dyn TaskResultChannel> = results.clone();
        DagContext::new(self.build(), Some(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_build_invocation() {
        let invocation = TestInvocation::new()
            .with_run_id("run-1")
            .with_file_ids(&["a:1"])
            .with_environment("dag_directory", json!("/dags"))
            .with_relay_target("show_context")
            .build();

        assert_eq!(
            invocation,
            json!({
                "params": {"runId": "run-1", "id": ["a:1"]},
                "environment_settings": {"dag_directory": "/dags"},
                "xcom_target": ["show_context"],
            })
        );
    }

    #[test]
    fn test_dag_context_from_invocation() {
        let temp = tempfile::TempDir::new().unwrap();
        let results = Arc::new(InMemoryTaskResults::new());
        results.push("show_context", json!({"example_data": 3}));

        let ctx = TestInvocation::new()
            .with_run_id("run-2")
            .with_temp_directory(temp.path())
            .with_relay_target("show_context")
            .dag_context(&results)
            .unwrap();

        assert_eq!(ctx.run_id(), Some("run-2"));
        assert_eq!(ctx.relay_data().find("example_data", None), Some(&json!(3)));
    }
}
