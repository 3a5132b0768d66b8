//! The per-task view of a DAG run.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::property::PropertyClass;
use crate::auth::{AccessToken, AuthFactory, IdentityProvider, IdentitySelector, TokenCollection};
use crate::config::constants::{context, environment, execution, identity, log, persist};
use crate::config::{execution_settings, Settings};
use crate::errors::{InvalidArgumentError, MissingKeyError, Result};
use crate::inflight::InflightTracker;
use crate::logging::{ActivityLog, ActivityLogConfig};
use crate::relay::{resolve_from, RelayData, TaskResultChannel, TransientRelay};

/// Everything a task needs from its invocation context.
///
/// Construction parses the execution settings of the run, the environment
/// settings bundled at DAG definition time and the outputs of the upstream
/// tasks named in `xcom_target`. When the run has an id, the context also
/// owns the run's inflight tracker and activity log, both rooted in the
/// environment's temp directory.
pub struct DagContext {
    context: Value,
    execution: Settings,
    environment: Map<String, Value>,
    relay_data: RelayData,
    run_id: Option<String>,
    tracker: Option<InflightTracker>,
    activity: ActivityLog,
    identity_providers: Option<Vec<Arc<dyn IdentityProvider>>>,
    tokens: OnceCell<TokenCollection>,
}

impl std::fmt::Debug for DagContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DagContext")
            .field("run_id", &self.run_id)
            .field("execution", &self.execution)
            .field("environment", &self.environment.keys().collect::<Vec<_>>())
            .field("relay_targets", &self.relay_data.task_names())
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

/// Run ids may arrive as strings or numbers; empty strings do not count.
fn run_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Environment settings may be an object or its JSON text.
fn parse_environment(invocation: &Value) -> Result<Map<String, Value>> {
    match invocation.get(environment::ENVIRONMENT_SETTINGS) {
        Some(Value::Object(settings)) => Ok(settings.clone()),
        Some(Value::String(text)) => match serde_json::from_str(text)? {
            Value::Object(settings) => Ok(settings),
            _ => Err(InvalidArgumentError::new(
                environment::ENVIRONMENT_SETTINGS,
                "environment settings must be a JSON object",
            )
            .into()),
        },
        _ => Ok(Map::new()),
    }
}

/// `xcom_target` may name one task or a list of tasks.
fn relay_targets(invocation: &Value) -> Vec<String> {
    match invocation.get(context::XCOM_TARGET) {
        Some(Value::String(target)) => vec![target.clone()],
        Some(Value::Array(targets)) => targets
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

impl DagContext {
    /// Parses a task invocation context.
    ///
    /// `task_instance` is the channel upstream outputs are pulled from; without
    /// it no relay data is loaded.
    ///
    /// # Errors
    ///
    /// `MissingKey` if the run has an id but the environment has no
    /// `temp_directory`, `Serialization` if the environment settings are
    /// malformed JSON, or `Io` if the inflight directory cannot be created.
    pub fn new(context: Value, task_instance: Option<Arc<dyn TaskResultChannel>>) -> Result<Self> {
        let execution = execution_settings(&context);
        let environment = parse_environment(&context)?;

        let mut relay_data = RelayData::new();
        if let Some(channel) = &task_instance {
            for target in relay_targets(&context) {
                let value = resolve_from(channel.as_ref(), &target);
                relay_data.insert(target, value);
            }
        }

        let mut dag_context = Self {
            context,
            execution,
            environment,
            relay_data,
            run_id: None,
            tracker: None,
            activity: ActivityLog::disabled(),
            identity_providers: None,
            tokens: OnceCell::new(),
        };

        dag_context.run_id = [execution::SYSTEM_RUN_ID, execution::OPTIONAL_SYSTEM_RUN_ID]
            .iter()
            .find_map(|key| dag_context.execution.get(key).and_then(run_id_text));

        if let Some(run_id) = dag_context.run_id.clone() {
            let temp = dag_context.temp_directory()?;
            let log_config = ActivityLogConfig {
                directory: Some(temp.join(log::ACTIVITY_LOG_DIRECTORY)),
                cache_size: dag_context.activity_cache_size(),
            };
            dag_context.activity = ActivityLog::from_config(&log_config, Some(run_id.clone()));
            dag_context.tracker = Some(
                InflightTracker::new(run_id.as_str(), temp.join(persist::INFLIGHT_PERSIST_PATH))?
                    .with_activity_log(dag_context.activity.clone()),
            );
            info!(run_id = %run_id, "Inflight tracking enabled");
        } else {
            debug!("No run id in context, inflight tracking disabled");
        }

        let ids = match dag_context.execution.get(execution::SYSTEM_FILE_ID) {
            None | Some(Value::Null) => Value::Array(Vec::new()),
            Some(Value::Array(ids)) => Value::Array(ids.clone()),
            Some(single) => Value::Array(vec![single.clone()]),
        };
        dag_context.execution.set(execution::SYSTEM_FILE_ID, ids);

        Ok(dag_context)
    }

    /// Uses these providers instead of the fixed set when tokens are first
    /// requested.
    #[must_use]
    pub fn with_identity_providers(mut self, providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        self.identity_providers = Some(providers);
        self
    }

    /// The raw invocation context.
    #[must_use]
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// The run id, if the trigger payload carried one.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Execution settings of the run.
    #[must_use]
    pub fn execution(&self) -> &Settings {
        &self.execution
    }

    /// Environment settings bundled with the DAG.
    #[must_use]
    pub fn environment(&self) -> &Map<String, Value> {
        &self.environment
    }

    /// Outputs of the upstream tasks.
    #[must_use]
    pub fn relay_data(&self) -> &RelayData {
        &self.relay_data
    }

    /// The run's inflight tracker; `None` without a run id.
    #[must_use]
    pub fn tracker(&self) -> Option<&InflightTracker> {
        self.tracker.as_ref()
    }

    /// The run's activity log; disabled without a run id.
    #[must_use]
    pub fn activity_log(&self) -> &ActivityLog {
        &self.activity
    }

    /// Identifiers of the files this run processes.
    #[must_use]
    pub fn file_ids(&self) -> Vec<&str> {
        self.execution
            .get(execution::SYSTEM_FILE_ID)
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Looks a value up in one of the property classes.
    ///
    /// Environment and execution lookups count a key as present even when
    /// its value is null. Relay lookups search the upstream outputs for the
    /// first non-null value under `field_name`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `field_name` is empty; `MissingKey` if the value
    /// is absent and `fail_on_missing` is set.
    pub fn get_value(
        &self,
        class: PropertyClass,
        field_name: &str,
        fail_on_missing: bool,
    ) -> Result<Option<&Value>> {
        if field_name.is_empty() {
            return Err(InvalidArgumentError::new("field_name", "No field name presented").into());
        }

        let value = match class {
            PropertyClass::Execution => self.execution.get(field_name),
            PropertyClass::Environment => self.environment.get(field_name),
            PropertyClass::Relay => self.relay_data.find(field_name, None),
        };

        if value.is_none() && fail_on_missing {
            return Err(MissingKeyError::new(class.as_str(), field_name).into());
        }
        Ok(value)
    }

    /// Sets a value in the execution or environment settings.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `field_name` is empty or `class` is read-only.
    pub fn put_value(&mut self, class: PropertyClass, field_name: &str, value: Value) -> Result<()> {
        if field_name.is_empty() {
            return Err(InvalidArgumentError::new("field_name", "No field name presented").into());
        }

        if !class.is_writable() {
            return Err(InvalidArgumentError::new(
                "class",
                format!("{class} PropertyClass does not support put"),
            )
            .into());
        }

        match class {
            PropertyClass::Execution => self.execution.set(field_name, value),
            PropertyClass::Environment => {
                self.environment.insert(field_name.to_string(), value);
            }
            PropertyClass::Relay => {}
        }
        Ok(())
    }

    fn activity_cache_size(&self) -> usize {
        self.environment
            .get(log::ACTIVITY_LOG_CACHE_SIZE_SETTING)
            .and_then(Value::as_u64)
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(log::ACTIVITY_LOG_CACHE_SIZE)
    }

    fn environment_text(&self, field_name: &str) -> Option<String> {
        self.environment
            .get(field_name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Returns the token acquired for `selector`.
    ///
    /// Every provider is queried on the first call; later calls reuse the
    /// result. Providers that failed yield `None`.
    pub async fn get_authentication_token(&self, selector: IdentitySelector) -> Option<AccessToken> {
        let tokens = self
            .tokens
            .get_or_init(|| async {
                match &self.identity_providers {
                    Some(providers) => AuthFactory::collect(providers, &self.activity).await,
                    None => {
                        AuthFactory::load_authentication(
                            self.environment_text(identity::IDENTITY_ENDPOINT),
                            self.environment_text(identity::IDENTITY_HEADER),
                            &self.activity,
                        )
                        .await
                    }
                }
            })
            .await;

        tokens.get(&selector).cloned().flatten()
    }

    /// The environment's temp directory.
    ///
    /// # Errors
    ///
    /// `MissingKey` if it is absent or not a string.
    pub fn temp_directory(&self) -> Result<PathBuf> {
        self.get_value(PropertyClass::Environment, environment::TEMP_DIRECTORY, true)?
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .ok_or_else(|| {
                MissingKeyError::new(
                    PropertyClass::Environment.as_str(),
                    environment::TEMP_DIRECTORY,
                )
                .into()
            })
    }

    /// A relay persisting under `<temp>/xcom_data` for this run.
    ///
    /// # Errors
    ///
    /// `MissingKey` if the environment has no temp directory.
    pub fn relay(&self) -> Result<TransientRelay> {
        Ok(TransientRelay::new(
            self.run_id.clone(),
            self.temp_directory()?.join(persist::RELAY_PERSIST_PATH),
        ))
    }

    /// Persists a task output and returns the file path to hand downstream.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for names outside the allow-list, `MissingKey`
    /// without a temp directory, or an I/O error from the write.
    pub fn persist_relay(&self, logical_name: &str, data: &Value) -> Result<PathBuf> {
        self.relay()?.persist(logical_name, data)
    }

    /// Removes this run's relay artifacts, or every artifact with
    /// `clear_all`. Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// `MissingKey` without a temp directory, or an I/O error.
    pub fn clear_relay(&self, clear_all: bool) -> Result<usize> {
        self.relay()?.clear(clear_all)
    }

    /// Human-readable dump of the execution, environment and relay data.
    #[must_use]
    pub fn summarize(&self) -> String {
        let pretty = |value: &Value| serde_json::to_string_pretty(value).unwrap_or_default();

        format!(
            "Execution Configuration from DAG:\n{}\nEnvironment Settings:\n{}\nRelay Passed Data:\n{}",
            self.execution.to_json(None).unwrap_or_default(),
            pretty(&Value::Object(self.environment.clone())),
            pretty(&self.relay_data.to_value()),
        )
    }
}
