//! Logging for task runs.
//!
//! This module provides:
//! - A per-run activity log handle with archive rotation
//! - Global `tracing` subscriber setup

mod activity;
mod subscriber;

pub use activity::{maintain_archive, ActivityLog, ActivityLogConfig, LogArg, LogLevel};
pub use subscriber::{init_tracing, LogFormat};
