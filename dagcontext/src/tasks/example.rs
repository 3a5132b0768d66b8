//! An example pair of tasks passing data through the relay.

use std::path::PathBuf;

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::auth::IdentitySelector;
use crate::config::constants::{environment, execution, identity, relay, variables};
use crate::context::{DagContext, PropertyClass};
use crate::errors::Result;
use crate::logging::LogArg;

/// Task name of the producer.
pub const SHOW_CONTEXT_TASK: &str = "show_context";
/// Task name of the consumer.
pub const CONSUME_RELAY_TASK: &str = "consume_relay";

/// The payload `show_context` hands downstream.
#[must_use]
pub fn example_payload() -> Value {
    let mut data = Map::new();
    data.insert(
        relay::TASK_DATA_EXAMPLE.to_string(),
        json!("Example data being passed"),
    );

    let mut payload = Map::new();
    payload.insert(relay::FIRST_TASK_NAME.to_string(), Value::Object(data));
    Value::Object(payload)
}

/// Example tasks of the `context_example` DAG.
pub struct ExampleTasks;

impl ExampleTasks {
    /// Reads the run and environment settings, claims the run's files and
    /// persists a payload for the next task.
    ///
    /// Returns the path of the persisted payload, which is what the task
    /// publishes as its result.
    ///
    /// # Errors
    ///
    /// `MissingKey` if the run or environment settings are incomplete, or an
    /// I/O error from claiming or persisting.
    pub fn show_context(context: &DagContext) -> Result<PathBuf> {
        let log = context.activity_log();
        log.info([LogArg::from(context.summarize())]);

        let file_ids = context.get_value(PropertyClass::Execution, execution::SYSTEM_FILE_ID, true)?;
        let partition =
            context.get_value(PropertyClass::Execution, execution::SYSTEM_PARTITION_ID, true)?;
        let run_id = context.get_value(PropertyClass::Execution, execution::SYSTEM_RUN_ID, true)?;
        log.segment("Execution Information");
        log.info([LogArg::from("Run ID:"), run_id.into()]);
        log.info([LogArg::from("File ID:"), file_ids.into()]);
        log.info([LogArg::from("Partition:"), partition.into()]);

        let search_instances =
            context.get_value(PropertyClass::Environment, variables::SEARCH_INSTANCES, true)?;
        let temp_directory =
            context.get_value(PropertyClass::Environment, environment::TEMP_DIRECTORY, true)?;
        let platform_host =
            context.get_value(PropertyClass::Environment, identity::PLATFORM_HOST, true)?;
        log.segment("Environment Information");
        log.info([LogArg::from("Platform Host:"), platform_host.into()]);
        log.info([LogArg::from("Temp Directory:"), temp_directory.into()]);
        log.info([LogArg::from("Search Instances:"), search_instances.into()]);

        if let Some(tracker) = context.tracker() {
            let ids = context.file_ids();
            let pending = tracker.unclaimed(&ids);
            if pending.len() < ids.len() {
                log.warn([LogArg::from(format!(
                    "Skipping {} identifiers already being processed",
                    ids.len() - pending.len()
                ))]);
            }
            tracker.claim(&pending)?;
            log.info([LogArg::from(format!("Claimed {} identifiers", pending.len()))]);
        }

        context.persist_relay(relay::FIRST_TASK_PERSIST_NAME, &example_payload())
    }

    /// Reads the upstream payload and tokens, then fails on purpose so the
    /// cleanup path runs.
    ///
    /// On failure the run's inflight claims are abandoned and its relay
    /// artifacts cleared before the error is returned.
    ///
    /// # Errors
    ///
    /// Always returns the `MissingKey` error of the deliberate lookup.
    pub async fn consume_relay(context: &DagContext) -> Result<()> {
        let outcome = Self::consume(context).await;

        if let Err(err) = &outcome {
            let log = context.activity_log();
            log.error([LogArg::error(err)]);

            if let Some(tracker) = context.tracker() {
                let cause: &(dyn std::error::Error + 'static) = err;
                if let Err(cleanup) = tracker.abandon(Some(cause)) {
                    warn!(error = %cleanup, "Failed to abandon inflight tracking");
                }
            }
            if let Err(cleanup) = context.clear_relay(false) {
                warn!(error = %cleanup, "Failed to clear relay artifacts");
            }
        }

        outcome
    }

    async fn consume(context: &DagContext) -> Result<()> {
        let log = context.activity_log();
        log.info([LogArg::from(context.summarize())]);
        log.segment("Consuming Relay");

        let value = context.get_value(PropertyClass::Relay, relay::TASK_DATA_EXAMPLE, true)?;
        log.info([
            LogArg::from(format!("Relay Field Value for {}", relay::TASK_DATA_EXAMPLE)),
            value.into(),
        ]);

        let default_token = context
            .get_authentication_token(IdentitySelector::DefaultCredential)
            .await;
        let system_token = context
            .get_authentication_token(IdentitySelector::System)
            .await;
        log.info([
            LogArg::from("Authentication tokens:"),
            format!("Default Token acquired: {}", default_token.is_some()).into(),
            format!("System Token acquired: {}", system_token.is_some()).into(),
        ]);

        log.info([LogArg::from(
            "Intentional error to come on missing relay data to clear files",
        )]);
        context.get_value(PropertyClass::Relay, "Field Doesn't Exist", true)?;

        Ok(())
    }
}
