//! The configuration classes a task can query.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which part of the task context a value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyClass {
    /// Settings assembled when the DAG was defined.
    Environment,
    /// Settings of this run, parsed from the trigger payload.
    Execution,
    /// Outputs of upstream tasks.
    Relay,
}

impl PropertyClass {
    /// Name used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Environment => "Environment",
            Self::Execution => "Execution",
            Self::Relay => "Relay",
        }
    }

    /// Whether values of this class can be written.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::Relay)
    }
}

impl fmt::Display for PropertyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_relay_is_read_only() {
        assert!(PropertyClass::Environment.is_writable());
        assert!(PropertyClass::Execution.is_writable());
        assert!(!PropertyClass::Relay.is_writable());
        assert_eq!(PropertyClass::Relay.to_string(), "Relay");
    }
}
