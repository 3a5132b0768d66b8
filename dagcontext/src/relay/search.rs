//! Resolved relay data and the recursive field search over it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Depth-first search for the first mapping containing `field`.
///
/// The current mapping's own key wins over nested ones; nested mappings are
/// visited in the map's iteration order, which decides between duplicate
/// keys at the same depth. Null values count as absent, so the search keeps
/// looking for a populated occurrence.
#[must_use]
pub fn find_in<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(value) = data.get(field).filter(|v| !v.is_null()) {
        return Some(value);
    }

    data.values()
        .filter_map(Value::as_object)
        .find_map(|child| find_in(child, field))
}

/// Finds `field`, then optionally `sub_field` inside the mapping found.
///
/// With a `sub_field`, a `field` whose value is not a mapping yields `None`
/// rather than the value itself, so a hit always matches both names.
#[must_use]
pub fn find_field<'a>(
    data: &'a Map<String, Value>,
    field: &str,
    sub_field: Option<&str>,
) -> Option<&'a Value> {
    let found = find_in(data, field)?;
    match sub_field {
        Some(sub) => found.as_object().and_then(|inner| find_in(inner, sub)),
        None => Some(found),
    }
}

/// Outputs of upstream tasks, keyed by task name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayData {
    targets: Map<String, Value>,
}

impl RelayData {
    /// Creates empty relay data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the resolved output of a task.
    pub fn insert(&mut self, task_name: impl Into<String>, value: Value) {
        self.targets.insert(task_name.into(), value);
    }

    /// Returns the resolved output of a task.
    #[must_use]
    pub fn get(&self, task_name: &str) -> Option<&Value> {
        self.targets.get(task_name)
    }

    /// Searches all loaded outputs for `field` (and `sub_field` within it).
    #[must_use]
    pub fn find(&self, field: &str, sub_field: Option<&str>) -> Option<&Value> {
        find_field(&self.targets, field, sub_field)
    }

    /// Returns true if nothing was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Returns the loaded task names.
    #[must_use]
    pub fn task_names(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    /// Returns all loaded outputs as one JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.targets.clone())
    }
}

impl From<Map<String, Value>> for RelayData {
    fn from(targets: Map<String, Value>) -> Self {
        Self { targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_find_nested() {
        let data = obj(json!({"a": {"inner": "x"}}));
        assert_eq!(find_field(&data, "inner", None), Some(&json!("x")));
    }

    #[test]
    fn test_find_missing_is_none() {
        let data = obj(json!({"a": {"inner": "x"}}));
        assert_eq!(find_field(&data, "missing", None), None);
    }

    #[test]
    fn test_top_level_wins() {
        let data = obj(json!({"k": 1, "nested": {"k": 2}}));
        assert_eq!(find_field(&data, "k", None), Some(&json!(1)));
    }

    #[test]
    fn test_null_is_skipped() {
        let data = obj(json!({"k": null, "nested": {"deeper": {"k": "found"}}}));
        assert_eq!(find_field(&data, "k", None), Some(&json!("found")));
    }

    #[test]
    fn test_falsy_values_are_found() {
        let data = obj(json!({"nested": {"count": 0, "flag": false, "name": ""}}));
        assert_eq!(find_field(&data, "count", None), Some(&json!(0)));
        assert_eq!(find_field(&data, "flag", None), Some(&json!(false)));
        assert_eq!(find_field(&data, "name", None), Some(&json!("")));
    }

    #[test]
    fn test_arrays_are_not_searched() {
        let data = obj(json!({"items": [{"k": 1}]}));
        assert_eq!(find_field(&data, "k", None), None);
    }

    #[test]
    fn test_sub_field() {
        let data = obj(json!({
            "show_context": {"first_task": {"example_data": "payload", "other": 1}}
        }));
        assert_eq!(
            find_field(&data, "first_task", Some("example_data")),
            Some(&json!("payload"))
        );
        assert_eq!(find_field(&data, "first_task", Some("absent")), None);
    }

    #[test]
    fn test_sub_field_on_scalar_is_none() {
        let data = obj(json!({"first_task": "not a mapping"}));
        assert_eq!(find_field(&data, "first_task", Some("x")), None);
    }

    #[test]
    fn test_relay_data_find() {
        let mut relay = RelayData::new();
        assert!(relay.is_empty());

        relay.insert("show_context", json!({"first_task": {"example_data": "v"}}));

        assert_eq!(relay.find("example_data", None), Some(&json!("v")));
        assert_eq!(relay.task_names(), vec!["show_context".to_string()]);
        assert_eq!(
            relay.to_value(),
            json!({"show_context": {"first_task": {"example_data": "v"}}})
        );
    }
}
