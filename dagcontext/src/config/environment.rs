//! Environment settings assembled when the DAG is defined.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::constants::environment::ENVIRONMENT_SETTINGS;
use super::loader::VariableLoader;
use crate::errors::{InvalidArgumentError, Result};

/// Collects environment variables, scheduler variables and explicit
/// overrides into the settings bundle every task receives.
///
/// The bundle travels with the task context under `environment_settings`,
/// so tasks never read the process environment themselves.
#[derive(Default)]
pub struct EnvironmentConfiguration {
    config: Map<String, Value>,
}

impl std::fmt::Debug for EnvironmentConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentConfiguration")
            .field("keys", &self.config.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EnvironmentConfiguration {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads process environment variables; absent ones are stored as null.
    #[must_use]
    pub fn with_environment_variables<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names.iter().map(AsRef::as_ref) {
            let value = std::env::var(name).map_or(Value::Null, Value::String);
            self.config.insert(name.to_string(), value);
        }
        self
    }

    /// Loads scheduler variables through `loader`; absent ones are null.
    #[must_use]
    pub fn with_variables<S: AsRef<str>>(
        mut self,
        loader: &Arc<dyn VariableLoader>,
        names: &[S],
    ) -> Self {
        for name in names.iter().map(AsRef::as_ref) {
            let value = loader.load(name).unwrap_or(Value::Null);
            self.config.insert(name.to_string(), value);
        }
        self
    }

    /// Adds or replaces a setting.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `field_name` is empty.
    pub fn update_config(&mut self, field_name: &str, field_value: Value) -> Result<()> {
        if field_name.is_empty() {
            return Err(InvalidArgumentError::new("field_name", "field_name cannot be empty").into());
        }
        self.config.insert(field_name.to_string(), field_value);
        Ok(())
    }

    /// Gets a setting.
    #[must_use]
    pub fn get(&self, field_name: &str) -> Option<&Value> {
        self.config.get(field_name)
    }

    /// Returns `{"environment_settings": {...}}` merged with `optionals`.
    ///
    /// The result is what a task receives as part of its invocation context.
    #[must_use]
    pub fn get_config(&self, optionals: Option<Map<String, Value>>) -> Value {
        let mut bundle = Map::new();
        bundle.insert(
            ENVIRONMENT_SETTINGS.to_string(),
            Value::Object(self.config.clone()),
        );
        if let Some(extra) = optionals {
            bundle.extend(extra);
        }
        Value::Object(bundle)
    }
}
