//! Identity provider abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::AuthError;

/// Selects one of the fixed identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentitySelector {
    /// The default credential chain.
    #[serde(rename = "DefaultAzureCredential")]
    DefaultCredential,
    /// The signed-in Azure CLI user.
    #[serde(rename = "AzureCliCredential")]
    AzureCli,
    /// The platform's managed identity.
    #[serde(rename = "OakSystemCredential")]
    System,
}

impl IdentitySelector {
    /// All selectors, in the order the factory queries them.
    pub const ALL: [Self; 3] = [Self::AzureCli, Self::DefaultCredential, Self::System];

    /// Returns the provider name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DefaultCredential => "DefaultAzureCredential",
            Self::AzureCli => "AzureCliCredential",
            Self::System => "OakSystemCredential",
        }
    }
}

impl fmt::Display for IdentitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_on: Option<i64>,
}

impl AccessToken {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_on: None,
        }
    }

    /// Sets the expiry as a Unix timestamp.
    #[must_use]
    pub fn with_expires_on(mut self, expires_on: i64) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    /// The raw token.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.token
    }

    /// Expiry as a Unix timestamp, if the provider reported one.
    #[must_use]
    pub fn expires_on(&self) -> Option<i64> {
        self.expires_on
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// A source of access tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Which selector this provider answers to.
    fn selector(&self) -> IdentitySelector;

    /// Acquires a token.
    async fn get_token(&self) -> Result<AccessToken, AuthError>;
}
