//! Well-known names shared by the DAG definition and its tasks.

/// Keys of the environment settings bundle.
pub mod environment {
    /// Context key holding the environment settings bundle.
    pub const ENVIRONMENT_SETTINGS: &str = "environment_settings";
    /// Working directory of the scheduler.
    pub const WORKING_DIRECTORY: &str = "working_directory";
    /// Scratch directory for relay artifacts, markers and logs.
    pub const TEMP_DIRECTORY: &str = "temp_directory";
    /// Directory holding the DAG definitions.
    pub const DAG_DIRECTORY: &str = "dag_directory";
    /// Authentication settings.
    pub const AUTHENTICATION: &str = "authentication";
}

/// Keys of the task invocation context.
pub mod context {
    /// Upstream task names whose outputs should be loaded.
    pub const XCOM_TARGET: &str = "xcom_target";
    /// The running task instance.
    pub const TASK_INSTANCE: &str = "task_instance";
    /// DAG params (2.x trigger payload).
    pub const TASK_PARAMS: &str = "params";
    /// The DAG run (1.x trigger payload lives in `conf`).
    pub const TASK_DAGRUN: &str = "dag_run";
    /// Field of the DAG run holding its configuration.
    pub const TASK_DAGRUN_CONF: &str = "conf";
    /// Execution context nested in the DAG run configuration.
    pub const TASK_DAGRUN_EXECUTION_CONTEXT: &str = "execution_context";
    /// User token forwarded by the triggering API.
    pub const TASK_CONTEXT_AUTHENTICATION: &str = "authToken";
}

/// Fields expected in the execution configuration of a run.
pub mod execution {
    /// Run id set by the triggering system.
    pub const SYSTEM_RUN_ID: &str = "runId";
    /// Fallback run id key.
    pub const OPTIONAL_SYSTEM_RUN_ID: &str = "run_id";
    /// Nested execution context.
    pub const SYSTEM_EXECUTION_CONTEXT: &str = "executionContext";
    /// Identifiers of the files to process.
    pub const SYSTEM_FILE_ID: &str = "id";
    /// Data partition of the files.
    pub const SYSTEM_PARTITION_ID: &str = "dataPartitionId";
    /// Kind of the files.
    pub const SYSTEM_FILE_KIND: &str = "kind";
}

/// Names of scheduler variables to load.
pub mod variables {
    /// Search instance configuration.
    pub const SEARCH_INSTANCES: &str = "km_search_instances";
    /// Prefix under which the scheduler exports variables to the environment.
    pub const ENV_PREFIX: &str = "AIRFLOW_VAR_";
}

/// Directories under the temp directory.
pub mod persist {
    /// Relay artifacts.
    pub const RELAY_PERSIST_PATH: &str = "xcom_data";
    /// Inflight markers and manifests.
    pub const INFLIGHT_PERSIST_PATH: &str = "inflight";
    /// Example persisted task output.
    pub const EXAMPLE_TASK: &str = "example.json";
}

/// Logical names used to pass data between tasks.
pub mod relay {
    /// Persisted output of the first example task.
    pub const FIRST_TASK_PERSIST_NAME: &str = "first_task.json";
    /// Field wrapping the first task's output.
    pub const FIRST_TASK_NAME: &str = "first_task";
    /// Example payload field.
    pub const TASK_DATA_EXAMPLE: &str = "example_data";

    /// Names accepted by `TransientRelay::persist` by default.
    pub const ALLOWED_NAMES: &[&str] = &[
        FIRST_TASK_PERSIST_NAME,
        FIRST_TASK_NAME,
        TASK_DATA_EXAMPLE,
        super::persist::EXAMPLE_TASK,
    ];
}

/// Identity endpoint settings.
pub mod identity {
    /// Environment variable with the managed identity endpoint.
    pub const IDENTITY_ENDPOINT: &str = "IDENTITY_ENDPOINT";
    /// Environment variable with the managed identity header.
    pub const IDENTITY_HEADER: &str = "IDENTITY_HEADER";
    /// Environment variable with the platform host.
    pub const PLATFORM_HOST: &str = "AIRFLOW_VAR_AZURE_DNS_HOST";
    /// Resource requested from credential providers.
    pub const DEFAULT_TOKEN_RESOURCE: &str = "https://management.core.windows.net/";
    /// Endpoint used when `IDENTITY_ENDPOINT` is unset.
    pub const DEFAULT_IDENTITY_ENDPOINT: &str =
        "http://169.254.169.254/metadata/identity/oauth2/token";
    /// Query appended to the identity endpoint.
    pub const SYSTEM_IDENTITY_QUERY: &str =
        "api-version=2018-02-01&resource=https%3A%2F%2Fmanagement.azure.com%2F";
}

/// Activity log settings.
pub mod log {
    /// Directory under the temp directory.
    pub const ACTIVITY_LOG_DIRECTORY: &str = "activity_log";
    /// Suffix appended to the run id to form the file name.
    pub const ACTIVITY_LOG_SUFFIX: &str = "_activity.log";
    /// Number of log files kept.
    pub const ACTIVITY_LOG_CACHE_SIZE: usize = 50;
    /// Environment setting overriding the number of log files kept.
    pub const ACTIVITY_LOG_CACHE_SIZE_SETTING: &str = "activity_log_cache_size";
}
