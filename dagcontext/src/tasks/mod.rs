//! Example DAG tasks.
//!
//! `show_context` persists a payload through the relay and claims the run's
//! files; `consume_relay` reads the payload back, fetches tokens and then
//! fails on purpose to exercise the cleanup path.

mod example;

pub use example::{example_payload, ExampleTasks, CONSUME_RELAY_TASK, SHOW_CONTEXT_TASK};
