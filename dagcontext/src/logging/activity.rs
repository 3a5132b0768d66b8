//! Per-run activity log files.
//!
//! Every task of a run appends to `<directory>/<run_id>_activity.log`, so the
//! whole run can be read back in one place after the scheduler has moved on.
//! Each rendered line is also emitted through `tracing`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::constants::log::{ACTIVITY_LOG_CACHE_SIZE, ACTIVITY_LOG_SUFFIX};
use crate::utils::timestamps::log_timestamp;

const SEGMENT_RULE: &str = "************************************************";

/// Severity of an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Informational.
    Info,
    /// Something unexpected that did not stop the task.
    Warn,
    /// A failure.
    Error,
}

impl LogLevel {
    /// The label written into the log line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// One argument of a log call.
#[derive(Debug, Clone, PartialEq)]
pub enum LogArg {
    /// Written verbatim.
    Text(String),
    /// Pretty-printed, one output line per JSON line.
    Json(serde_json::Value),
    /// An error: a type line followed by a tab-indented message line.
    Error {
        /// Type name of the error.
        kind: String,
        /// Display of the error and its sources.
        message: String,
    },
}

impl LogArg {
    /// Captures an error with its source chain.
    pub fn error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::Error {
            kind: std::any::type_name::<E>().to_string(),
            message,
        }
    }

    fn render(&self, lines: &mut Vec<String>) {
        match self {
            Self::Text(text) => lines.push(text.clone()),
            Self::Json(value) => match value {
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    let pretty = serde_json::to_string_pretty(value)
                        .unwrap_or_else(|_| value.to_string());
                    lines.extend(pretty.lines().map(ToString::to_string));
                }
                serde_json::Value::String(s) => lines.push(s.clone()),
                other => lines.push(other.to_string()),
            },
            Self::Error { kind, message } => {
                lines.push(format!("({kind})"));
                lines.push(format!("\t{message}"));
            }
        }
    }
}

impl From<&str> for LogArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for LogArg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<serde_json::Value> for LogArg {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<&serde_json::Value> for LogArg {
    fn from(value: &serde_json::Value) -> Self {
        Self::Json(value.clone())
    }
}

impl From<Option<&serde_json::Value>> for LogArg {
    fn from(value: Option<&serde_json::Value>) -> Self {
        Self::Json(value.cloned().unwrap_or(serde_json::Value::Null))
    }
}

/// Settings for the activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogConfig {
    /// Directory holding the log files. `None` disables file output.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// How many log files to keep in the directory.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_cache_size() -> usize {
    ACTIVITY_LOG_CACHE_SIZE
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            cache_size: default_cache_size(),
        }
    }
}

/// Handle to the activity log of one run.
///
/// Constructed once per run and passed to whatever needs to log. A handle
/// without a directory or run id only forwards to `tracing`.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    directory: Option<PathBuf>,
    run_id: Option<String>,
    cache_size: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ActivityLog {
    /// Creates a handle writing to `<directory>/<run_id>_activity.log`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            directory: Some(directory.into()),
            run_id: Some(run_id.into()),
            cache_size: ACTIVITY_LOG_CACHE_SIZE,
        }
    }

    /// Creates a handle from configuration.
    #[must_use]
    pub fn from_config(config: &ActivityLogConfig, run_id: Option<String>) -> Self {
        Self {
            directory: config.directory.clone(),
            run_id,
            cache_size: config.cache_size,
        }
    }

    /// A handle that never touches the filesystem.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            directory: None,
            run_id: None,
            cache_size: ACTIVITY_LOG_CACHE_SIZE,
        }
    }

    /// The file this handle appends to, if file output is enabled.
    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        match (&self.directory, &self.run_id) {
            (Some(dir), Some(run_id)) => Some(dir.join(format!("{run_id}{ACTIVITY_LOG_SUFFIX}"))),
            _ => None,
        }
    }

    /// Writes a banner separating the sections of a task.
    pub fn segment(&self, name: &str) {
        let lines = [
            format!("{} {SEGMENT_RULE}", log_timestamp()),
            format!("{} {name}", log_timestamp()),
            format!("{} {SEGMENT_RULE}", log_timestamp()),
        ];
        info!(run_id = self.run_id.as_deref(), segment = name, "Activity segment");
        self.write_lines(&lines);
    }

    /// Informational entry.
    pub fn info(&self, args: impl IntoIterator<Item = LogArg>) {
        self.log(LogLevel::Info, args);
    }

    /// Warning entry.
    pub fn warn(&self, args: impl IntoIterator<Item = LogArg>) {
        self.log(LogLevel::Warn, args);
    }

    /// Error entry.
    pub fn error(&self, args: impl IntoIterator<Item = LogArg>) {
        self.log(LogLevel::Error, args);
    }

    /// Renders the arguments and appends them at the given level.
    pub fn log(&self, level: LogLevel, args: impl IntoIterator<Item = LogArg>) {
        let mut rendered = Vec::new();
        for arg in args {
            arg.render(&mut rendered);
        }

        let run_id = self.run_id.as_deref();
        for line in &rendered {
            match level {
                LogLevel::Info => info!(run_id, "{line}"),
                LogLevel::Warn => warn!(run_id, "{line}"),
                LogLevel::Error => error!(run_id, "{line}"),
            }
        }

        let stamp = log_timestamp();
        let lines: Vec<String> = rendered
            .iter()
            .map(|line| format!("{stamp} {:<8} {line}", level.label()))
            .collect();
        self.write_lines(&lines);
    }

    fn write_lines(&self, lines: &[String]) {
        let (Some(directory), Some(path)) = (&self.directory, self.file_path()) else {
            return;
        };

        if let Err(e) = append_lines(directory, &path, lines) {
            warn!(path = %path.display(), error = %e, "Failed to write activity log");
            return;
        }

        match maintain_archive(directory, self.cache_size) {
            Ok(removed) if removed > 0 => {
                info!(removed, directory = %directory.display(), "Trimmed activity log archive");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to trim activity log archive"),
        }
    }
}

fn append_lines(directory: &Path, path: &Path, lines: &[String]) -> std::io::Result<()> {
    fs::create_dir_all(directory)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Keeps only the newest `cache_size` files in the directory.
///
/// Returns the number of files removed.
pub fn maintain_archive(directory: &Path, cache_size: usize) -> std::io::Result<usize> {
    if !directory.exists() {
        return Ok(0);
    }

    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, entry.path()));
        }
    }

    if found.len() <= cache_size {
        return Ok(0);
    }

    found.sort();
    let surplus = found.len() - cache_size;
    let mut removed = 0;
    for (_, path) in found.into_iter().take(surplus) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}
