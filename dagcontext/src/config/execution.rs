//! Execution configuration parsed out of a task invocation context.

use serde_json::Value;
use tracing::info;

use super::constants::{context, execution};
use super::Settings;

/// Builds the execution settings of a run from its invocation context.
///
/// Newer schedulers hand the trigger payload over as `params`. Older ones
/// keep it in `dag_run.conf`, sometimes with the real payload nested again
/// under `execution_context`. `params` is loaded first; the `dag_run` sources
/// are only consulted when the partition id is still unknown.
#[must_use]
pub fn execution_settings(invocation: &Value) -> Settings {
    let mut settings = Settings::new();

    if let Some(params) = invocation.get(context::TASK_PARAMS) {
        info!(source = context::TASK_PARAMS, "Loading parameters");
        settings.flatten_one_level(params);
    }

    if settings.contains(execution::SYSTEM_PARTITION_ID) {
        return settings;
    }

    let Some(conf) = invocation
        .get(context::TASK_DAGRUN)
        .and_then(|run| run.get(context::TASK_DAGRUN_CONF))
    else {
        return settings;
    };

    info!(source = context::TASK_DAGRUN, "Loading dag run configuration");
    settings.flatten_one_level(conf);

    if let Some(nested) = conf.get(context::TASK_DAGRUN_EXECUTION_CONTEXT) {
        info!(
            source = context::TASK_DAGRUN_EXECUTION_CONTEXT,
            "Loading execution context"
        );
        settings.flatten_one_level(nested);
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_only() {
        let settings = execution_settings(&json!({
            "params": {"runId": "r1", "dataPartitionId": "p", "dag_run": {"ignored": true}}
        }));

        assert_eq!(settings.get("runId"), Some(&json!("r1")));
        assert_eq!(settings.get("ignored"), Some(&json!(true)));
    }

    #[test]
    fn test_params_with_partition_skip_dag_run() {
        let settings = execution_settings(&json!({
            "params": {"dataPartitionId": "p"},
            "dag_run": {"conf": {"runId": "from-conf"}}
        }));

        assert!(settings.get("runId").is_none());
    }

    #[test]
    fn test_dag_run_conf_and_execution_context() {
        let settings = execution_settings(&json!({
            "params": {"OAK": "Examples"},
            "dag_run": {"conf": {
                "runId": "r2",
                "execution_context": {"id": ["f:1"], "dataPartitionId": "p2"}
            }}
        }));

        assert_eq!(settings.get("OAK"), Some(&json!("Examples")));
        assert_eq!(settings.get("runId"), Some(&json!("r2")));
        assert_eq!(settings.get("id"), Some(&json!(["f:1"])));
        assert_eq!(settings.get("dataPartitionId"), Some(&json!("p2")));
    }

    #[test]
    fn test_empty_invocation() {
        assert!(execution_settings(&json!({})).is_empty());
    }
}
