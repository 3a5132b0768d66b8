//! A flat, explicit settings map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat key/value settings.
///
/// Payloads handed to a task may nest one level deep; `flatten_one_level`
/// lifts the nested keys next to the top-level ones so lookups never need to
/// know which group a key came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    /// Creates empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Sets a value, replacing any existing one.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Checks if a key exists (even with a null value).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merges a payload into these settings.
    ///
    /// Object values have their own entries lifted to the top level; any
    /// other value is stored under its key. Only one level is lifted. A
    /// non-object payload is ignored.
    pub fn flatten_one_level(&mut self, payload: &Value) {
        let Some(entries) = payload.as_object() else {
            return;
        };

        for (key, value) in entries {
            match value {
                Value::Object(nested) => {
                    for (nested_key, nested_value) in nested {
                        self.values.insert(nested_key.clone(), nested_value.clone());
                    }
                }
                other => {
                    self.values.insert(key.clone(), other.clone());
                }
            }
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the settings as a JSON object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Serializes the settings plus `additional` entries.
    ///
    /// Returns `None` when the result would be empty.
    #[must_use]
    pub fn to_json(&self, additional: Option<&Map<String, Value>>) -> Option<String> {
        let mut output = self.values.clone();
        if let Some(extra) = additional {
            output.extend(extra.clone());
        }

        if output.is_empty() {
            return None;
        }
        serde_json::to_string(&output).ok()
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let mut settings = Settings::new();
        settings.set("runId", json!("run-1"));

        assert_eq!(settings.get("runId"), Some(&json!("run-1")));
        assert!(settings.contains("runId"));
        assert!(settings.get("other").is_none());
    }

    #[test]
    fn test_flatten_one_level() {
        let mut settings = Settings::new();
        settings.flatten_one_level(&json!({
            "runId": "run-1",
            "executionContext": {
                "id": "file:1",
                "dataPartitionId": "opendes",
                "deeper": {"kept": "as object"}
            }
        }));

        assert_eq!(settings.get("runId"), Some(&json!("run-1")));
        assert_eq!(settings.get("id"), Some(&json!("file:1")));
        assert_eq!(settings.get("dataPartitionId"), Some(&json!("opendes")));
        assert_eq!(settings.get("deeper"), Some(&json!({"kept": "as object"})));
        assert!(!settings.contains("executionContext"));
    }

    #[test]
    fn test_flatten_ignores_non_objects() {
        let mut settings = Settings::new();
        settings.flatten_one_level(&json!(["not", "a", "map"]));
        assert!(settings.is_empty());
    }

    #[test]
    fn test_to_json() {
        let mut settings = Settings::new();
        assert_eq!(settings.to_json(None), None);

        settings.set("a", json!(1));
        let mut extra = Map::new();
        extra.insert("b".to_string(), json!(2));

        let out: Value = serde_json::from_str(&settings.to_json(Some(&extra)).unwrap()).unwrap();
        assert_eq!(out, json!({"a": 1, "b": 2}));
    }
}
