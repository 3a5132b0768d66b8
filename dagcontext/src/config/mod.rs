//! Configuration for DAG tasks.
//!
//! This module provides:
//! - Well-known key names shared by DAG definitions and tasks
//! - A flat settings map with explicit one-level flattening
//! - Execution settings parsed from the invocation context
//! - Environment settings assembled at DAG definition time
//! - Scheduler variable loaders

pub mod constants;
mod environment;
mod execution;
mod loader;
mod settings;

pub use environment::EnvironmentConfiguration;
pub use execution::execution_settings;
pub use loader::{decode_variable, EnvVariableLoader, StaticVariableLoader, VariableLoader};
pub use settings::Settings;

#[cfg(test)]
pub use loader::MockVariableLoader;
