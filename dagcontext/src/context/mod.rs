//! Task context for DAG runs.
//!
//! This module provides:
//! - `DagContext`, the parsed view of a task invocation context
//! - `PropertyClass` to address its configuration classes

mod dag_context;
mod property;

pub use dag_context::DagContext;
pub use property::PropertyClass;
