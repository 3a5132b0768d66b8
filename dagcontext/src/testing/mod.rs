//! Testing utilities for DAG tasks.
//!
//! This module provides:
//! - A builder for task invocation contexts

mod fixtures;

pub use fixtures::TestInvocation;
