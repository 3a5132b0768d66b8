//! Utility functions for run ids and timestamp handling.

mod run_id;
pub mod timestamps;

pub use run_id::{generate_run_id, MANUAL_RUN_PREFIX};
pub use timestamps::{
    format_marker, log_timestamp, marker_timestamp, now_utc, parse_marker_timestamp, Timestamp,
    TimestampError,
};
