//! Runs the `context_example` DAG in-process.
//!
//! `show_context` persists a payload and claims the file ids given on the
//! command line; `consume_relay` loads the payload back and then fails on
//! purpose, releasing the claims and clearing the run's artifacts.
//!
//! ```text
//! context-example [FILE_ID ...]
//! ```

use std::sync::Arc;

use anyhow::Context as _;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use dagcontext::config::constants::{context, environment, execution, identity, variables};
use dagcontext::config::{EnvVariableLoader, EnvironmentConfiguration, VariableLoader};
use dagcontext::context::DagContext;
use dagcontext::logging::{init_tracing, LogFormat};
use dagcontext::relay::{InMemoryTaskResults, TaskResultChannel};
use dagcontext::tasks::{ExampleTasks, SHOW_CONTEXT_TASK};
use dagcontext::utils::generate_run_id;

/// Merges the trigger payload into the settings a task was defined with.
fn invocation(task_settings: Value, params: &Value) -> Value {
    let mut invocation = match task_settings {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    invocation.insert(context::TASK_PARAMS.to_string(), params.clone());
    Value::Object(invocation)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::Pretty);

    let working_directory = std::env::current_dir().context("reading working directory")?;
    let dag_directory = working_directory.join("dags");
    let temp_directory = std::env::temp_dir().join("dagcontext").join("example");
    std::fs::create_dir_all(&temp_directory)
        .with_context(|| format!("creating {}", temp_directory.display()))?;

    let loader: Arc<dyn VariableLoader> = Arc::new(EnvVariableLoader::new());
    let mut environment_config = EnvironmentConfiguration::new()
        .with_environment_variables(&[
            identity::IDENTITY_ENDPOINT,
            identity::IDENTITY_HEADER,
            identity::PLATFORM_HOST,
        ])
        .with_variables(&loader, &[variables::SEARCH_INSTANCES]);
    environment_config.update_config(
        environment::WORKING_DIRECTORY,
        json!(working_directory.to_string_lossy()),
    )?;
    environment_config.update_config(
        environment::DAG_DIRECTORY,
        json!(dag_directory.to_string_lossy()),
    )?;
    environment_config.update_config(
        environment::TEMP_DIRECTORY,
        json!(temp_directory.to_string_lossy()),
    )?;

    let mut file_ids: Vec<String> = std::env::args().skip(1).collect();
    if file_ids.is_empty() {
        file_ids = vec![
            "opendes:doc:example-1".to_string(),
            "opendes:doc:example-2".to_string(),
        ];
    }

    let run_id = generate_run_id();
    let mut params = Map::new();
    params.insert(execution::SYSTEM_RUN_ID.to_string(), json!(run_id));
    params.insert(execution::SYSTEM_PARTITION_ID.to_string(), json!("opendes"));
    params.insert(execution::SYSTEM_FILE_ID.to_string(), json!(file_ids));
    let params = Value::Object(params);
    info!(run_id = %run_id, temp = %temp_directory.display(), "Starting context_example");

    let results = Arc::new(InMemoryTaskResults::new());
    let channel: Arc<dyn TaskResultChannel> = results.clone();

    let producer = DagContext::new(
        invocation(environment_config.get_config(None), &params),
        Some(Arc::clone(&channel)),
    )?;
    let relay_path = ExampleTasks::show_context(&producer)?;
    results.push(
        SHOW_CONTEXT_TASK,
        Value::String(relay_path.to_string_lossy().into_owned()),
    );
    info!(task = SHOW_CONTEXT_TASK, path = %relay_path.display(), "Task finished");

    let mut optionals = Map::new();
    optionals.insert(context::XCOM_TARGET.to_string(), json!([SHOW_CONTEXT_TASK]));
    let consumer = DagContext::new(
        invocation(environment_config.get_config(Some(optionals)), &params),
        Some(channel),
    )?;

    match ExampleTasks::consume_relay(&consumer).await {
        Ok(()) => info!("consume_relay finished"),
        Err(e) => error!(error = %e, "consume_relay failed and cleaned up"),
    }

    if let Some(path) = consumer.activity_log().file_path() {
        println!("Activity log: {}", path.display());
    }
    Ok(())
}
