//! Run id generation for runners outside the scheduler.

use uuid::Uuid;

/// Prefix the scheduler gives to manually triggered runs.
pub const MANUAL_RUN_PREFIX: &str = "manual__";

/// Generates a run id unique to this execution.
#[must_use]
pub fn generate_run_id() -> String {
    format!("{MANUAL_RUN_PREFIX}{}", Uuid::new_v4())
}
