//! # dagcontext
//!
//! Helpers for tasks of scheduler-driven DAG workflows.
//!
//! dagcontext gives every task a structured view of the run it belongs to:
//!
//! - **Inflight tracking**: marker files that let overlapping runs skip
//!   identifiers another run is already processing
//! - **Transient relay**: run-scoped persistence of task outputs too large
//!   for the scheduler's result channel, and resolution back into JSON
//! - **Configuration**: execution settings from the trigger payload and
//!   environment settings bundled at DAG definition time
//! - **Authentication**: tokens from a fixed set of identity providers
//! - **Activity log**: a per-run log file with archive rotation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dagcontext::prelude::*;
//!
//! let context = DagContext::new(invocation, Some(task_results))?;
//!
//! if let Some(tracker) = context.tracker() {
//!     let ids = context.file_ids();
//!     tracker.claim(&tracker.unclaimed(&ids))?;
//! }
//!
//! let path = context.persist_relay("first_task.json", &payload)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod auth;
pub mod config;
pub mod context;
pub mod errors;
pub mod inflight;
pub mod logging;
pub mod relay;
pub mod tasks;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::{AccessToken, AuthFactory, IdentityProvider, IdentitySelector};
    pub use crate::config::{EnvironmentConfiguration, Settings, VariableLoader};
    pub use crate::context::{DagContext, PropertyClass};
    pub use crate::errors::{
        AuthError, DagContextError, InvalidArgumentError, MissingKeyError, Result,
    };
    pub use crate::inflight::InflightTracker;
    pub use crate::logging::{ActivityLog, LogArg};
    pub use crate::relay::{InMemoryTaskResults, RelayData, TaskResultChannel, TransientRelay};
}
