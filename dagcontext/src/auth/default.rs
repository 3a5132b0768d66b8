//! The default credential chain.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::cli::AzureCliIdentity;
use super::provider::{AccessToken, IdentityProvider, IdentitySelector};
use super::system::SystemIdentity;
use crate::errors::AuthError;

/// Tries each provider in order; the first token wins.
pub struct DefaultIdentity {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl std::fmt::Debug for DefaultIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultIdentity")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.selector()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl DefaultIdentity {
    /// Managed identity first, then the Azure CLI.
    #[must_use]
    pub fn new(endpoint: Option<String>, header: Option<String>) -> Self {
        Self::from_providers(vec![
            Arc::new(SystemIdentity::new(endpoint, header)),
            Arc::new(AzureCliIdentity::new()),
        ])
    }

    /// Builds a chain from explicit providers.
    #[must_use]
    pub fn from_providers(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl IdentityProvider for DefaultIdentity {
    fn selector(&self) -> IdentitySelector {
        IdentitySelector::DefaultCredential
    }

    async fn get_token(&self) -> Result<AccessToken, AuthError> {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.get_token().await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    debug!(provider = %provider.selector(), error = %e, "Credential in chain failed");
                    attempts.push(format!("{}: {e}", provider.selector()));
                }
            }
        }

        Err(AuthError::ChainExhausted {
            provider: self.selector().to_string(),
            attempts,
        })
    }
}
