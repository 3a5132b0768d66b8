//! Claim/check/release/abandon over the marker store for one run.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::store::{normalize_identifier, unusable_identifier, MarkerRemoval, MarkerStore};
use crate::errors::Result;
use crate::logging::{ActivityLog, LogArg};

/// Tracks which identifiers a run is processing so concurrent runs of the
/// same DAG can skip them.
///
/// Every claimed identifier gets a marker file in the shared directory and a
/// line in the run's manifest. The manifest is what `abandon` uses to release
/// everything the run claimed, whether it finished or failed.
///
/// This is a cooperative, best-effort guard: two runs that check the same
/// identifier before either has claimed it will both proceed.
#[derive(Debug, Clone)]
pub struct InflightTracker {
    run_id: String,
    store: MarkerStore,
    activity: ActivityLog,
}

impl InflightTracker {
    /// Creates a tracker for `run_id`, creating `marker_dir` if needed.
    pub fn new(run_id: impl Into<String>, marker_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            run_id: run_id.into(),
            store: MarkerStore::open(marker_dir)?,
            activity: ActivityLog::disabled(),
        })
    }

    /// Routes release diagnostics to the run's activity log.
    #[must_use]
    pub fn with_activity_log(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    /// The run this tracker claims for.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The shared marker directory.
    #[must_use]
    pub fn marker_dir(&self) -> &Path {
        self.store.root()
    }

    /// Path of this run's manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.store.manifest_path(&self.run_id)
    }

    /// The underlying marker store.
    #[must_use]
    pub fn store(&self) -> &MarkerStore {
        &self.store
    }

    /// Returns true if any run currently holds a marker for the identifier.
    #[must_use]
    pub fn exists(&self, identifier: &str) -> bool {
        self.store.has_marker(identifier)
    }

    /// Returns the identifiers not currently claimed by any run.
    #[must_use]
    pub fn unclaimed<'a, S: AsRef<str>>(&self, identifiers: &'a [S]) -> Vec<&'a str> {
        identifiers
            .iter()
            .map(AsRef::as_ref)
            .filter(|id| !self.exists(id))
            .collect()
    }

    /// Claims identifiers for this run.
    ///
    /// Each identifier is appended to the manifest first, then its marker is
    /// written. A failure in between leaves a manifest entry without a marker,
    /// which `abandon` releases as a no-op.
    ///
    /// Empty identifiers are skipped. An identifier whose last segment is not
    /// a plain file name (`..`, `a/b`, an absolute path) fails the whole
    /// claim with `InvalidArgument` before anything is written.
    pub fn claim<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<()> {
        let identifiers: Vec<&str> = identifiers
            .iter()
            .map(AsRef::as_ref)
            .filter(|id| !normalize_identifier(id).is_empty())
            .collect();
        if identifiers.is_empty() {
            return Ok(());
        }
        if let Some(unusable) = identifiers
            .iter()
            .find(|id| self.store.marker_path(id).is_none())
        {
            return Err(unusable_identifier(unusable).into());
        }

        self.store.append_manifest(&self.run_id, &identifiers)?;
        for identifier in &identifiers {
            self.store.write_marker(identifier)?;
        }

        debug!(run_id = %self.run_id, count = identifiers.len(), "Claimed inflight identifiers");
        Ok(())
    }

    /// Releases the markers of the given identifiers.
    ///
    /// Missing markers are logged and skipped; identifiers that cannot name a
    /// marker are skipped. Returns how many markers were removed.
    pub fn release<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<usize> {
        let mut released = 0;

        for identifier in identifiers.iter().map(AsRef::as_ref) {
            let Some(marker) = self.store.marker_path(identifier) else {
                if !normalize_identifier(identifier).is_empty() {
                    debug!(identifier, "Skipping identifier without an inflight marker");
                }
                continue;
            };

            let claimed_at = self.store.claimed_at(identifier);
            match self.store.remove_marker(identifier)? {
                MarkerRemoval::Removed => {
                    released += 1;
                    debug!(
                        marker = %marker.display(),
                        claimed_at = ?claimed_at,
                        "Deleted inflight record"
                    );
                }
                MarkerRemoval::Raced => {
                    debug!(marker = %marker.display(), "Inflight record removed concurrently");
                }
                MarkerRemoval::Absent => {
                    self.activity.info([LogArg::from(format!(
                        "{} inflight file is not currently present",
                        marker.display()
                    ))]);
                }
            }
        }

        Ok(released)
    }

    /// Releases everything this run claimed and deletes its manifest.
    ///
    /// Call once per run: after a clean finish with `None`, or from the
    /// failure handler with the error that ended the run. Without a manifest
    /// this returns 0.
    pub fn abandon(&self, error: Option<&(dyn std::error::Error + 'static)>) -> Result<usize> {
        match error {
            Some(err) => {
                warn!(run_id = %self.run_id, error = %err, "Inflight tracking abandoned");
                self.activity
                    .warn([LogArg::from("Inflight Tracking Abandoned:"), LogArg::error(err)]);
            }
            None => {
                info!(run_id = %self.run_id, "Inflight tracking abandoned: NO ERRORS");
            }
        }

        let Some(tracked) = self.store.read_manifest(&self.run_id)? else {
            return Ok(0);
        };

        let released = self.release(&tracked)?;
        self.store.remove_manifest(&self.run_id)?;
        Ok(released)
    }
}
