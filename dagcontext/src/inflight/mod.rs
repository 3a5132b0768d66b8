//! Inflight duplicate-processing guard.
//!
//! Runs of the same DAG can overlap and pick up the same input files. Each
//! run claims the identifiers it processes by writing marker files into a
//! shared directory; other runs check for those markers and skip what is
//! already being handled.

mod store;
mod tracker;

pub use store::{marker_name, normalize_identifier, MarkerRemoval, MarkerStore};
pub use tracker::InflightTracker;
