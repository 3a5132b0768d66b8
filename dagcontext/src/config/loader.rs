//! Sources of scheduler variables.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::constants::variables::ENV_PREFIX;

/// Loads a named variable from the scheduler's variable store.
#[cfg_attr(test, mockall::automock)]
pub trait VariableLoader: Send + Sync {
    /// Returns the variable, JSON decoded when it holds JSON.
    fn load(&self, name: &str) -> Option<serde_json::Value>;
}

/// Reads variables the scheduler exported as `AIRFLOW_VAR_<NAME>`.
#[derive(Debug, Clone)]
pub struct EnvVariableLoader {
    prefix: String,
}

impl Default for EnvVariableLoader {
    fn default() -> Self {
        Self {
            prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl EnvVariableLoader {
    /// Creates a loader using the default prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader using a custom prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable name for a scheduler variable.
    #[must_use]
    pub fn env_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.to_uppercase())
    }
}

impl VariableLoader for EnvVariableLoader {
    fn load(&self, name: &str) -> Option<serde_json::Value> {
        let raw = std::env::var(self.env_name(name)).ok()?;
        Some(decode_variable(raw))
    }
}

/// Variables held in memory; handy for local runs and tests.
#[derive(Debug, Default)]
pub struct StaticVariableLoader {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl StaticVariableLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable.
    #[must_use]
    pub fn with(self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.write().insert(name.into(), value);
        self
    }
}

impl VariableLoader for StaticVariableLoader {
    fn load(&self, name: &str) -> Option<serde_json::Value> {
        self.values.read().get(name).cloned()
    }
}

/// Decodes a variable as JSON, falling back to the raw string.
#[must_use]
pub fn decode_variable(raw: String) -> serde_json::Value {
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
}
