//! Passing data between tasks.
//!
//! This module provides:
//! - The upstream task-result channel abstraction
//! - Run-scoped persistence of large task outputs
//! - Resolution of file-backed or inline outputs into JSON
//! - Recursive field search over the resolved outputs

mod channel;
mod search;
mod transient;

pub use channel::{InMemoryTaskResults, TaskResultChannel};
pub use search::{find_field, find_in, RelayData};
pub use transient::{resolve_from, resolve_raw, TransientRelay};

#[cfg(test)]
pub use channel::MockTaskResultChannel;
