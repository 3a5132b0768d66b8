//! Tokens of the signed-in Azure CLI user.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::provider::{AccessToken, IdentityProvider, IdentitySelector};
use crate::config::constants::identity::DEFAULT_TOKEN_RESOURCE;
use crate::errors::AuthError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Parses the JSON printed by `az account get-access-token`.
pub(crate) fn parse_cli_output(stdout: &[u8]) -> Result<AccessToken, AuthError> {
    let parsed: CliToken =
        serde_json::from_slice(stdout).map_err(|e| AuthError::MalformedResponse {
            provider: IdentitySelector::AzureCli.to_string(),
            reason: e.to_string(),
        })?;

    let token = AccessToken::new(parsed.access_token);
    Ok(match parsed.expires_on {
        Some(ts) => token.with_expires_on(ts),
        None => token,
    })
}

/// Runs `az account get-access-token` for the management resource.
#[derive(Debug, Clone)]
pub struct AzureCliIdentity {
    program: String,
    resource: String,
}

impl Default for AzureCliIdentity {
    fn default() -> Self {
        Self {
            program: "az".to_string(),
            resource: DEFAULT_TOKEN_RESOURCE.to_string(),
        }
    }
}

impl AzureCliIdentity {
    /// Creates the provider using `az` from the `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl IdentityProvider for AzureCliIdentity {
    fn selector(&self) -> IdentitySelector {
        IdentitySelector::AzureCli
    }

    async fn get_token(&self) -> Result<AccessToken, AuthError> {
        let output = Command::new(&self.program)
            .args([
                "account",
                "get-access-token",
                "--resource",
                self.resource.as_str(),
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|e| AuthError::Command {
                provider: self.selector().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(AuthError::Command {
                provider: self.selector().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_cli_output(&output.stdout)
    }
}
