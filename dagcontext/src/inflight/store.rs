//! Filesystem-backed marker records and per-run manifests.

use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::errors::{InvalidArgumentError, Result};
use crate::utils::timestamps::{marker_timestamp, parse_marker_timestamp, Timestamp};

/// Prefix of every run manifest file name.
pub const MANIFEST_PREFIX: &str = "processing-";
/// Suffix of every run manifest file name.
pub const MANIFEST_SUFFIX: &str = ".txt";

/// Strips everything up to and including the last `:` of an identifier.
///
/// `"partition:file:abc"` becomes `"abc"`; identifiers without a colon are
/// returned unchanged.
#[must_use]
pub fn normalize_identifier(identifier: &str) -> &str {
    identifier.rsplit(':').next().unwrap_or(identifier)
}

/// The marker file name of an identifier, if it can be used as one.
///
/// The normalized identifier must be a single plain path segment: empty
/// names, `.`, `..`, absolute paths and names containing a separator have no
/// marker. Names shaped like a run manifest are rejected too.
#[must_use]
pub fn marker_name(identifier: &str) -> Option<&str> {
    let name = normalize_identifier(identifier);
    let mut components = Path::new(name).components();
    let single_segment = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment == OsStr::new(name)
    );
    let manifest_like = name.starts_with(MANIFEST_PREFIX) && name.ends_with(MANIFEST_SUFFIX);
    (single_segment && !manifest_like).then_some(name)
}

/// Outcome of deleting a single marker record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRemoval {
    /// The marker existed and this call removed it.
    Removed,
    /// No marker was present when checked.
    Absent,
    /// The marker was seen but another process deleted it first.
    Raced,
}

/// The shared marker directory.
///
/// Marker files are named by the normalized identifier and contain the claim
/// timestamp. Manifest files (`processing-<run_id>.txt`) live in the same
/// directory and list the raw identifiers a run has claimed, one per line.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    root: PathBuf,
}

impl MarkerStore {
    /// Opens the store, creating the directory if it does not exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the marker directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the marker record for an identifier; `None` if the
    /// identifier has no usable marker name.
    #[must_use]
    pub fn marker_path(&self, identifier: &str) -> Option<PathBuf> {
        marker_name(identifier).map(|name| self.root.join(name))
    }

    /// Path of the manifest for a run.
    #[must_use]
    pub fn manifest_path(&self, run_id: &str) -> PathBuf {
        self.root
            .join(format!("{MANIFEST_PREFIX}{run_id}{MANIFEST_SUFFIX}"))
    }

    /// Returns true if a marker record exists for the identifier.
    #[must_use]
    pub fn has_marker(&self, identifier: &str) -> bool {
        self.marker_path(identifier).is_some_and(|path| path.is_file())
    }

    /// Writes (or overwrites) the marker record with the current UTC time.
    pub fn write_marker(&self, identifier: &str) -> Result<PathBuf> {
        let path = self
            .marker_path(identifier)
            .ok_or_else(|| unusable_identifier(identifier))?;
        fs::write(&path, marker_timestamp())?;
        debug!(marker = %path.display(), "Marker written");
        Ok(path)
    }

    /// Reads the claim time of a marker, if the marker exists and parses.
    #[must_use]
    pub fn claimed_at(&self, identifier: &str) -> Option<Timestamp> {
        let content = fs::read_to_string(self.marker_path(identifier)?).ok()?;
        parse_marker_timestamp(&content).ok()
    }

    /// Deletes a marker record, tolerating concurrent deletion.
    ///
    /// Identifiers without a usable marker name, and marker paths that are
    /// not regular files, count as absent.
    pub fn remove_marker(&self, identifier: &str) -> Result<MarkerRemoval> {
        let Some(path) = self.marker_path(identifier) else {
            return Ok(MarkerRemoval::Absent);
        };
        if !path.is_file() {
            return Ok(MarkerRemoval::Absent);
        }

        match fs::remove_file(&path) {
            Ok(()) => Ok(MarkerRemoval::Removed),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(MarkerRemoval::Raced),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends raw identifiers to the run manifest.
    pub fn append_manifest<S: AsRef<str>>(&self, run_id: &str, identifiers: &[S]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.manifest_path(run_id))?;

        for identifier in identifiers {
            writeln!(file, "{}", identifier.as_ref())?;
        }
        file.flush()?;
        Ok(())
    }

    /// Reads the identifiers listed in a run manifest.
    ///
    /// Returns `None` when the run has no manifest. Blank lines are skipped
    /// and surrounding whitespace is trimmed; duplicates are kept.
    pub fn read_manifest(&self, run_id: &str) -> Result<Option<Vec<String>>> {
        match fs::read_to_string(self.manifest_path(run_id)) {
            Ok(content) => Ok(Some(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes a run manifest. Returns false if it was already gone.
    pub fn remove_manifest(&self, run_id: &str) -> Result<bool> {
        match fs::remove_file(self.manifest_path(run_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

}

pub(crate) fn unusable_identifier(identifier: &str) -> InvalidArgumentError {
    InvalidArgumentError::new(
        "identifiers",
        format!("{identifier} does not name a usable inflight marker"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("part:1"), "1");
        assert_eq!(normalize_identifier("osdu:wks:file:abc"), "abc");
        assert_eq!(normalize_identifier("plain"), "plain");
        assert_eq!(normalize_identifier("trailing:"), "");
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("inflight");

        MarkerStore::open(&root).unwrap();
        assert!(root.is_dir());
        // Second open on an existing directory is fine.
        MarkerStore::open(&root).unwrap();
    }

    #[test]
    fn test_marker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::open(dir.path()).unwrap();

        assert!(!store.has_marker("ns:abc"));
        store.write_marker("ns:abc").unwrap();
        assert!(store.has_marker("abc"));
        assert!(store.claimed_at("other:abc").is_some());

        assert_eq!(store.remove_marker("abc").unwrap(), MarkerRemoval::Removed);
        assert_eq!(store.remove_marker("abc").unwrap(), MarkerRemoval::Absent);
    }

    #[test]
    fn test_manifest_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::open(dir.path()).unwrap();

        assert_eq!(store.read_manifest("run-1").unwrap(), None);

        store.append_manifest("run-1", &["a:1", "a:2"]).unwrap();
        store.append_manifest("run-1", &["a:1"]).unwrap();

        let listed = store.read_manifest("run-1").unwrap().unwrap();
        assert_eq!(listed, vec!["a:1", "a:2", "a:1"]);
        assert!(dir.path().join("processing-run-1.txt").is_file());
    }

    #[test]
    fn test_remove_manifest_twice() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::open(dir.path()).unwrap();

        store.append_manifest("run-1", &["x"]).unwrap();
        assert!(store.remove_manifest("run-1").unwrap());
        assert!(!store.remove_manifest("run-1").unwrap());
    }

    #[test]
    fn test_marker_name_accepts_plain_segments() {
        assert_eq!(marker_name("opendes:doc:abc-1"), Some("abc-1"));
        assert_eq!(marker_name("file.json"), Some("file.json"));
        assert_eq!(marker_name("..hidden"), Some("..hidden"));
    }

    #[test]
    fn test_marker_name_rejects_paths() {
        let rejected = [
            "",
            "file:",
            "/abs/path",
            "file:/etc/passwd",
            "..",
            "file:..",
            ".",
            "a/b",
            "a/",
            "processing-run-1.txt",
        ];
        for identifier in rejected {
            assert_eq!(marker_name(identifier), None, "{identifier}");
        }
    }

    #[test]
    fn test_unusable_identifier_has_no_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::open(dir.path().join("inflight")).unwrap();
        let outside = dir.path().join("outside.txt");
        fs::write(&outside, "keep").unwrap();
        let absolute = outside.to_string_lossy().into_owned();

        assert_eq!(store.marker_path(&absolute), None);
        assert!(!store.has_marker(&absolute));
        assert!(!store.has_marker(".."));
        assert_eq!(store.remove_marker(&absolute).unwrap(), MarkerRemoval::Absent);
        assert_eq!(store.remove_marker("file:..").unwrap(), MarkerRemoval::Absent);
        assert!(matches!(
            store.write_marker("a/b"),
            Err(crate::errors::DagContextError::InvalidArgument(_))
        ));
        assert!(outside.is_file());
    }

    #[test]
    fn test_remove_marker_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::open(dir.path()).unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        assert!(!store.has_marker("subdir"));
        assert_eq!(store.remove_marker("subdir").unwrap(), MarkerRemoval::Absent);
        assert!(dir.path().join("subdir").is_dir());
    }
}
