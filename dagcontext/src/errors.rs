//! Error types for the dagcontext helpers.
//!
//! The taxonomy separates caller mistakes (invalid arguments), fail-fast
//! lookups of missing configuration, token acquisition failures and plain
//! filesystem or serialization problems.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for dagcontext operations.
#[derive(Debug, Error)]
pub enum DagContextError {
    /// The caller passed an argument the operation does not accept.
    #[error("{0}")]
    InvalidArgument(#[from] InvalidArgumentError),

    /// A required configuration value was missing.
    #[error("{0}")]
    MissingKey(#[from] MissingKeyError),

    /// An authentication token could not be acquired.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T, E = DagContextError> = std::result::Result<T, E>;

/// Error raised when an argument is outside of what an operation accepts.
#[derive(Debug, Clone, Error)]
#[error("Invalid argument '{argument}': {message}")]
pub struct InvalidArgumentError {
    /// The offending argument name.
    pub argument: String,
    /// Why the argument was rejected.
    pub message: String,
}

impl InvalidArgumentError {
    /// Creates a new invalid argument error.
    #[must_use]
    pub fn new(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Error for a relay name that is not in the allow-list.
    #[must_use]
    pub fn unknown_relay_name(name: &str) -> Self {
        Self::new(
            "logical_name",
            format!("Requested task not in relay persist values: {name}"),
        )
    }
}

/// Error raised when a lookup that was asked to fail fast finds nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Configuration - {configuration} - missing value for {key}")]
pub struct MissingKeyError {
    /// The configuration class that was searched.
    pub configuration: String,
    /// The key that was not found.
    pub key: String,
}

impl MissingKeyError {
    /// Creates a new missing key error.
    #[must_use]
    pub fn new(configuration: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            configuration: configuration.into(),
            key: key.into(),
        }
    }
}

/// Errors related to token acquisition.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum AuthError {
    /// The identity endpoint answered with a non-success status.
    #[error("Failed to get token on endpoint {endpoint} (status {status})")]
    EndpointStatus {
        /// The endpoint URL.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The identity endpoint could not be reached.
    #[error("Request to {endpoint} failed: {reason}")]
    Request {
        /// The endpoint URL.
        endpoint: String,
        /// Transport failure description.
        reason: String,
    },

    /// The token response did not contain a token.
    #[error("Malformed token response from {provider}: {reason}")]
    MalformedResponse {
        /// The provider name.
        provider: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// A credential command failed.
    #[error("Credential command for {provider} failed: {reason}")]
    Command {
        /// The provider name.
        provider: String,
        /// Stderr or spawn failure.
        reason: String,
    },

    /// No provider in a chain produced a token.
    #[error("No credential in chain {provider} produced a token: {}", attempts.join("; "))]
    ChainExhausted {
        /// The chain name.
        provider: String,
        /// Per-provider failures in attempt order.
        attempts: Vec<String>,
    },

    /// The provider is compiled out of this build.
    #[error("Identity provider {provider} is not available in this build")]
    Unavailable {
        /// The provider name.
        provider: String,
    },
}

impl AuthError {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        let kind = match self {
            Self::EndpointStatus { .. } => "EndpointStatus",
            Self::Request { .. } => "Request",
            Self::MalformedResponse { .. } => "MalformedResponse",
            Self::Command { .. } => "Command",
            Self::ChainExhausted { .. } => "ChainExhausted",
            Self::Unavailable { .. } => "Unavailable",
        };
        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_message() {
        let err = MissingKeyError::new("Relay", "example_data");
        assert_eq!(
            err.to_string(),
            "Configuration - Relay - missing value for example_data"
        );
    }

    #[test]
    fn test_unknown_relay_name() {
        let err = InvalidArgumentError::unknown_relay_name("bogus.json");
        assert_eq!(err.argument, "logical_name");
        assert!(err.to_string().contains("bogus.json"));
    }

    #[test]
    fn test_from_conversions() {
        let err: DagContextError = MissingKeyError::new("Environment", "temp_directory").into();
        assert!(matches!(err, DagContextError::MissingKey(_)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DagContextError = io.into();
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_chain_exhausted_lists_attempts() {
        let err = AuthError::ChainExhausted {
            provider: "DefaultAzureCredential".to_string(),
            attempts: vec!["system: down".to_string(), "cli: missing".to_string()],
        };
        assert!(err.to_string().contains("system: down; cli: missing"));
        assert_eq!(err.to_dict().get("type").unwrap(), "ChainExhausted");
    }
}
