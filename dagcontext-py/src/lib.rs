//! Python bindings for the dagcontext Rust library.
//!
//! Exposes the inflight tracker, the transient relay and the relay search to
//! Python DAG tasks. JSON-like values cross the boundary as dicts, lists and
//! scalars.

use pyo3::exceptions::{PyKeyError, PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use std::fmt;
use std::path::PathBuf;

use dagcontext::errors::DagContextError;
use dagcontext::inflight::{marker_name as inflight_marker_name, InflightTracker};
use dagcontext::relay::{find_field as find_relay_field, resolve_raw, TransientRelay};

/// Maps crate errors onto the matching Python exception types.
fn to_py_err(err: DagContextError) -> PyErr {
    match err {
        DagContextError::InvalidArgument(e) => PyValueError::new_err(e.to_string()),
        DagContextError::MissingKey(e) => PyKeyError::new_err(e.to_string()),
        DagContextError::Serialization(e) => PyValueError::new_err(e.to_string()),
        DagContextError::Io(e) => PyOSError::new_err(e.to_string()),
        DagContextError::Auth(e) => PyRuntimeError::new_err(e.to_string()),
    }
}

/// The Python exception that ended a run, carried into `abandon`.
#[derive(Debug)]
struct TaskFailure(String);

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TaskFailure {}

/// Python wrapper for InflightTracker.
#[pyclass(name = "InflightTracker")]
pub struct PyInflightTracker {
    inner: InflightTracker,
}

#[pymethods]
impl PyInflightTracker {
    #[new]
    fn new(run_id: String, marker_dir: PathBuf) -> PyResult<Self> {
        let inner = InflightTracker::new(run_id, marker_dir).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Returns the run id.
    #[getter]
    fn run_id(&self) -> &str {
        self.inner.run_id()
    }

    /// Returns the shared marker directory.
    #[getter]
    fn marker_dir(&self) -> String {
        self.inner.marker_dir().to_string_lossy().into_owned()
    }

    /// Returns the path of this run's manifest.
    #[getter]
    fn manifest_path(&self) -> String {
        self.inner.manifest_path().to_string_lossy().into_owned()
    }

    /// Returns true if any run has claimed the identifier.
    fn exists(&self, identifier: &str) -> bool {
        self.inner.exists(identifier)
    }

    /// Returns the identifiers no run has claimed.
    fn unclaimed(&self, identifiers: Vec<String>) -> Vec<String> {
        self.inner
            .unclaimed(&identifiers)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Claims identifiers for this run.
    fn claim(&self, identifiers: Vec<String>) -> PyResult<()> {
        self.inner.claim(&identifiers).map_err(to_py_err)
    }

    /// Releases identifiers; returns how many markers were removed.
    fn release(&self, identifiers: Vec<String>) -> PyResult<usize> {
        self.inner.release(&identifiers).map_err(to_py_err)
    }

    /// Releases everything this run claimed.
    #[pyo3(signature = (error = None))]
    fn abandon(&self, error: Option<&Bound<'_, PyAny>>) -> PyResult<usize> {
        let failure = match error {
            Some(err) if !err.is_none() => Some(TaskFailure(err.str()?.to_string())),
            _ => None,
        };
        let cause = failure
            .as_ref()
            .map(|f| f as &(dyn std::error::Error + 'static));
        self.inner.abandon(cause).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "InflightTracker(run_id='{}', marker_dir='{}')",
            self.inner.run_id(),
            self.inner.marker_dir().display()
        )
    }
}

/// Python wrapper for TransientRelay.
#[pyclass(name = "TransientRelay")]
pub struct PyTransientRelay {
    inner: TransientRelay,
}

#[pymethods]
impl PyTransientRelay {
    #[new]
    #[pyo3(signature = (persist_dir, run_id = None, allowed_names = None))]
    fn new(persist_dir: PathBuf, run_id: Option<String>, allowed_names: Option<Vec<String>>) -> Self {
        let mut inner = TransientRelay::new(run_id, persist_dir);
        if let Some(names) = allowed_names {
            inner = inner.with_allowed_names(names);
        }
        Self { inner }
    }

    /// Returns the run id, if any.
    #[getter]
    fn run_id(&self) -> Option<&str> {
        self.inner.run_id()
    }

    /// Returns the persistence directory.
    #[getter]
    fn persist_dir(&self) -> String {
        self.inner.persist_dir().to_string_lossy().into_owned()
    }

    /// Returns the file name an artifact is persisted under.
    fn artifact_name(&self, logical_name: &str) -> String {
        self.inner.artifact_name(logical_name)
    }

    /// Persists data and returns the file path.
    fn persist(&self, logical_name: &str, data: &Bound<'_, PyAny>) -> PyResult<String> {
        let value = py_to_json(data)?;
        let path = self
            .inner
            .persist(logical_name, &value)
            .map_err(to_py_err)?;
        Ok(path.to_string_lossy().into_owned())
    }

    /// Resolves a value published by an upstream task.
    fn resolve(&self, py: Python<'_>, raw: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        json_to_py(py, &resolve_raw(py_to_json(raw)?))
    }

    /// Removes this run's artifacts, or all of them with `clear_all`.
    #[pyo3(signature = (clear_all = false))]
    fn clear(&self, clear_all: bool) -> PyResult<usize> {
        self.inner.clear(clear_all).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "TransientRelay(run_id={:?}, persist_dir='{}')",
            self.inner.run_id(),
            self.inner.persist_dir().display()
        )
    }
}

/// Finds the first non-null value under `field` in nested dicts.
#[pyfunction]
#[pyo3(signature = (data, field, sub_field = None))]
fn find_field(
    py: Python<'_>,
    data: &Bound<'_, PyDict>,
    field: &str,
    sub_field: Option<&str>,
) -> PyResult<PyObject> {
    let serde_json::Value::Object(map) = py_to_json(data.as_any())? else {
        return Ok(py.None());
    };
    match find_relay_field(&map, field, sub_field) {
        Some(value) => json_to_py(py, value),
        None => Ok(py.None()),
    }
}

/// Returns the marker name of an identifier, or None if it cannot name one.
#[pyfunction]
fn marker_name(identifier: &str) -> Option<String> {
    inflight_marker_name(identifier).map(str::to_string)
}

fn py_to_json(obj: &Bound<'_, PyAny>) -> PyResult<serde_json::Value> {
    if obj.is_none() {
        return Ok(serde_json::Value::Null);
    }

    if let Ok(b) = obj.extract::<bool>() {
        return Ok(serde_json::Value::Bool(b));
    }

    if let Ok(i) = obj.extract::<i64>() {
        return Ok(serde_json::Value::Number(i.into()));
    }

    if let Ok(f) = obj.extract::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Ok(serde_json::Value::Number(n));
        }
    }

    if let Ok(s) = obj.extract::<String>() {
        return Ok(serde_json::Value::String(s));
    }

    if let Ok(list) = obj.downcast::<PyList>() {
        let mut arr = Vec::with_capacity(list.len());
        for item in list.iter() {
            arr.push(py_to_json(&item)?);
        }
        return Ok(serde_json::Value::Array(arr));
    }

    if let Ok(dict) = obj.downcast::<PyDict>() {
        let mut map = serde_json::Map::new();
        for (key, value) in dict.iter() {
            let key_str: String = key.extract()?;
            map.insert(key_str, py_to_json(&value)?);
        }
        return Ok(serde_json::Value::Object(map));
    }

    // Anything else is persisted as its string form.
    Ok(serde_json::Value::String(obj.str()?.to_string()))
}

fn json_to_py(py: Python<'_>, value: &serde_json::Value) -> PyResult<PyObject> {
    Ok(match value {
        serde_json::Value::Null => py.None(),
        serde_json::Value::Bool(b) => b.into_py(py),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into_py(py)
            } else if let Some(f) = n.as_f64() {
                f.into_py(py)
            } else {
                py.None()
            }
        }
        serde_json::Value::String(s) => s.into_py(py),
        serde_json::Value::Array(arr) => {
            let list = PyList::empty_bound(py);
            for item in arr {
                list.append(json_to_py(py, item)?)?;
            }
            list.into_py(py)
        }
        serde_json::Value::Object(map) => {
            let dict = PyDict::new_bound(py);
            for (k, v) in map {
                dict.set_item(k, json_to_py(py, v)?)?;
            }
            dict.into_py(py)
        }
    })
}

/// Python module definition.
#[pymodule]
fn dagcontext_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyInflightTracker>()?;
    m.add_class::<PyTransientRelay>()?;
    m.add_function(wrap_pyfunction!(find_field, m)?)?;
    m.add_function(wrap_pyfunction!(marker_name, m)?)?;
    Ok(())
}
