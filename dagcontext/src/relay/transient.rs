//! Run-scoped persistence of task outputs that are too large to pass inline.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::channel::TaskResultChannel;
use super::search::RelayData;
use crate::config::constants::relay::ALLOWED_NAMES;
use crate::errors::{InvalidArgumentError, Result};

/// Resolves a raw upstream value into structured data.
///
/// A string naming an existing file is replaced by the file's content, JSON
/// decoded when possible; an empty file resolves to `Value::Null`. Any other
/// string is JSON decoded when possible.
/// Anything that does not decode is returned as the raw string; non-string
/// values pass through untouched.
#[must_use]
pub fn resolve_raw(raw: Value) -> Value {
    let Value::String(text) = raw else {
        return raw;
    };

    let path = Path::new(&text);
    if !text.is_empty() && path.is_file() {
        return match fs::read_to_string(path) {
            Ok(content) if content.is_empty() => Value::Null,
            Ok(content) => serde_json::from_str(&content).unwrap_or(Value::String(content)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Relay file unreadable, keeping raw value");
                Value::String(text)
            }
        };
    }

    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Pulls `task_name` from the channel and resolves it. Missing values
/// resolve to `Value::Null`.
#[must_use]
pub fn resolve_from(channel: &dyn TaskResultChannel, task_name: &str) -> Value {
    channel.pull(task_name).map_or(Value::Null, resolve_raw)
}

/// Persists task outputs under `<persist_dir>/<run_id>_<logical_name>` and
/// resolves upstream outputs back into data.
///
/// Logical names are checked against an allow-list so every persisted
/// artifact has a name the downstream tasks know about.
#[derive(Clone)]
pub struct TransientRelay {
    run_id: Option<String>,
    persist_dir: PathBuf,
    allowed_names: BTreeSet<String>,
    channel: Option<Arc<dyn TaskResultChannel>>,
}

impl std::fmt::Debug for TransientRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientRelay")
            .field("run_id", &self.run_id)
            .field("persist_dir", &self.persist_dir)
            .field("allowed_names", &self.allowed_names)
            .field("has_channel", &self.channel.is_some())
            .finish()
    }
}

impl TransientRelay {
    /// Creates a relay for the run. The directory is created on first use.
    ///
    /// A relative `persist_dir` is anchored at the current directory so
    /// `persist` always reports absolute paths.
    #[must_use]
    pub fn new(run_id: Option<String>, persist_dir: impl Into<PathBuf>) -> Self {
        let persist_dir = persist_dir.into();
        let persist_dir = if persist_dir.is_absolute() {
            persist_dir
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&persist_dir))
                .unwrap_or(persist_dir)
        };

        Self {
            run_id,
            persist_dir,
            allowed_names: ALLOWED_NAMES.iter().map(ToString::to_string).collect(),
            channel: None,
        }
    }

    /// Adds logical names to the allow-list.
    #[must_use]
    pub fn with_allowed_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the channel upstream results are pulled from.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn TaskResultChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// The run this relay is bound to.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// The persistence directory.
    #[must_use]
    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    /// Returns true if `logical_name` may be persisted.
    #[must_use]
    pub fn is_allowed(&self, logical_name: &str) -> bool {
        self.allowed_names.contains(logical_name)
    }

    /// File name an artifact for `logical_name` gets in this run.
    #[must_use]
    pub fn artifact_name(&self, logical_name: &str) -> String {
        match &self.run_id {
            Some(run_id) => format!("{run_id}_{logical_name}"),
            None => logical_name.to_string(),
        }
    }

    /// Writes `data` for `logical_name` and returns the absolute path.
    ///
    /// Objects and arrays are written as indented JSON, strings as-is and
    /// other scalars as their JSON text.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the name is not in the allow-list; nothing is
    /// written in that case.
    pub fn persist(&self, logical_name: &str, data: &Value) -> Result<PathBuf> {
        if !self.is_allowed(logical_name) {
            return Err(InvalidArgumentError::unknown_relay_name(logical_name).into());
        }

        let content = match data {
            Value::Object(_) | Value::Array(_) => to_indented_json(data)?,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        fs::create_dir_all(&self.persist_dir)?;
        let path = self.persist_dir.join(self.artifact_name(logical_name));
        fs::write(&path, content)?;

        debug!(path = %path.display(), "Persisted relay artifact");
        Ok(path)
    }

    /// Pulls the output of `task_name` from the channel and resolves it.
    ///
    /// Never fails on non-JSON content; without a channel or a published
    /// value the result is `Value::Null`.
    #[must_use]
    pub fn resolve(&self, task_name: &str) -> Value {
        self.channel
            .as_deref()
            .map_or(Value::Null, |channel| resolve_from(channel, task_name))
    }

    /// Resolves every target into a `RelayData` keyed by task name.
    #[must_use]
    pub fn load<S: AsRef<str>>(&self, targets: &[S]) -> RelayData {
        let mut data = RelayData::new();
        for target in targets.iter().map(AsRef::as_ref) {
            data.insert(target, self.resolve(target));
        }
        data
    }

    /// Removes persisted artifacts.
    ///
    /// With `clear_all` the whole persistence directory (every run) goes and
    /// 0 is returned. Otherwise only this run's `<run_id>_*` files are
    /// removed and counted; a relay without a run id removes nothing.
    pub fn clear(&self, clear_all: bool) -> Result<usize> {
        if !self.persist_dir.exists() {
            return Ok(0);
        }

        if clear_all {
            match fs::remove_dir_all(&self.persist_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            info!(dir = %self.persist_dir.display(), "Cleared all relay artifacts");
            return Ok(0);
        }

        let Some(run_id) = &self.run_id else {
            return Ok(0);
        };
        let prefix = format!("{run_id}_");

        let mut removed = 0;
        for entry in fs::read_dir(&self.persist_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let owned = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix));
            if !owned {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(run_id = %run_id, removed, "Cleared run relay artifacts");
        Ok(removed)
    }
}

fn to_indented_json(data: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DagContextError;
    use crate::relay::channel::{InMemoryTaskResults, MockTaskResultChannel};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn relay(dir: &Path, run_id: &str) -> TransientRelay {
        TransientRelay::new(Some(run_id.to_string()), dir.join("xcom_data"))
    }

    #[test]
    fn test_persist_writes_run_scoped_file() {
        let dir = tempfile::tempdir().unwrap();
        let r = relay(dir.path(), "run-42");

        let path = r.persist("first_task.json", &json!({"k": "v"})).unwrap();

        assert!(path.is_absolute());
        assert_eq!(path, dir.path().join("xcom_data").join("run-42_first_task.json"));
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\n    \"k\": \"v\"\n}");
    }

    #[test]
    fn test_persist_without_run_id_uses_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        let r = TransientRelay::new(None, dir.path());

        let path = r.persist("example_data", &json!("plain text")).unwrap();

        assert_eq!(path.file_name().unwrap(), "example_data");
        assert_eq!(fs::read_to_string(&path).unwrap(), "plain text");
    }

    #[test]
    fn test_persist_scalar_number() {
        let dir = tempfile::tempdir().unwrap();
        let r = relay(dir.path(), "run-1");

        let path = r.persist("first_task", &json!(42)).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "42");
    }

    #[test]
    fn test_persist_unknown_name_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let r = relay(dir.path(), "run-1");

        let err = r.persist("not_allowed", &json!({"k": "v"})).unwrap_err();

        assert!(matches!(err, DagContextError::InvalidArgument(_)));
        assert!(!r.persist_dir().exists());
    }

    #[test]
    fn test_with_allowed_names() {
        let dir = tempfile::tempdir().unwrap();
        let r = relay(dir.path(), "run-1").with_allowed_names(["custom.json"]);

        assert!(r.is_allowed("custom.json"));
        assert!(r.is_allowed("first_task.json"));
        r.persist("custom.json", &json!([1, 2])).unwrap();
    }

    #[test]
    fn test_persist_then_resolve_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(InMemoryTaskResults::new());
        let r = relay(dir.path(), "run-1").with_channel(channel.clone());

        let path = r.persist("first_task.json", &json!({"k": "v"})).unwrap();
        channel.push("show_context", json!(path.to_string_lossy()));

        assert_eq!(r.resolve("show_context"), json!({"k": "v"}));
    }

    #[test]
    fn test_resolve_inline_json_and_text() {
        let mut channel = MockTaskResultChannel::new();
        channel
            .expect_pull()
            .times(3)
            .returning(|name| match name {
                "inline" => Some(json!("{\"a\": 1}")),
                "text" => Some(json!("just words")),
                _ => None,
            });

        let dir = tempfile::tempdir().unwrap();
        let r = relay(dir.path(), "run-1").with_channel(Arc::new(channel));

        assert_eq!(r.resolve("inline"), json!({"a": 1}));
        assert_eq!(r.resolve("text"), json!("just words"));
        assert_eq!(r.resolve("silent"), Value::Null);
    }

    #[test]
    fn test_resolve_file_with_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "not { json").unwrap();

        assert_eq!(
            resolve_raw(json!(file.to_string_lossy())),
            json!("not { json")
        );
    }

    #[test]
    fn test_resolve_empty_file_is_null() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.json");
        fs::write(&file, "").unwrap();

        assert_eq!(resolve_raw(json!(file.to_string_lossy())), Value::Null);
    }

    #[test]
    fn test_resolve_passes_structured_values_through() {
        assert_eq!(resolve_raw(json!({"a": [1]})), json!({"a": [1]}));
        assert_eq!(resolve_raw(json!(7)), json!(7));
    }

    #[test]
    fn test_resolve_without_channel_is_null() {
        let r = TransientRelay::new(None, "relative/dir");
        assert!(r.persist_dir().is_absolute());
        assert_eq!(r.resolve("anything"), Value::Null);
    }

    #[test]
    fn test_load_targets() {
        let channel = Arc::new(InMemoryTaskResults::new());
        channel.push("a", json!("{\"x\": {\"y\": 1}}"));
        let r = TransientRelay::new(None, "unused").with_channel(channel);

        let data = r.load(&["a", "b"]);
        assert_eq!(data.get("a"), Some(&json!({"x": {"y": 1}})));
        assert_eq!(data.get("b"), Some(&Value::Null));
        assert_eq!(data.find("x", Some("y")), Some(&json!(1)));
    }

    #[test]
    fn test_clear_run_only() {
        let dir = tempfile::tempdir().unwrap();
        let mine = relay(dir.path(), "run-42");
        let theirs = relay(dir.path(), "run-99");

        mine.persist("first_task.json", &json!({"a": 1})).unwrap();
        mine.persist("example_data", &json!("x")).unwrap();
        theirs.persist("first_task.json", &json!({"b": 2})).unwrap();

        assert_eq!(mine.clear(false).unwrap(), 2);
        assert!(theirs
            .persist_dir()
            .join("run-99_first_task.json")
            .exists());
        assert_eq!(mine.clear(false).unwrap(), 0);
    }

    #[test]
    fn test_clear_does_not_match_longer_run_ids() {
        let dir = tempfile::tempdir().unwrap();
        relay(dir.path(), "run-4")
            .persist("first_task", &json!(1))
            .unwrap();
        relay(dir.path(), "run-42")
            .persist("first_task", &json!(2))
            .unwrap();

        assert_eq!(relay(dir.path(), "run-4").clear(false).unwrap(), 1);
        assert!(dir.path().join("xcom_data/run-42_first_task").exists());
    }

    #[test]
    fn test_clear_all_removes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let r = relay(dir.path(), "run-1");
        r.persist("first_task", &json!(1)).unwrap();
        relay(dir.path(), "run-2").persist("first_task", &json!(2)).unwrap();

        assert_eq!(r.clear(true).unwrap(), 0);
        assert!(!r.persist_dir().exists());
        assert_eq!(r.clear(true).unwrap(), 0);
    }

    #[test]
    fn test_clear_without_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let r = TransientRelay::new(None, dir.path());
        r.persist("first_task", &json!(1)).unwrap();

        assert_eq!(r.clear(false).unwrap(), 0);
        assert!(dir.path().join("first_task").exists());
    }
}
