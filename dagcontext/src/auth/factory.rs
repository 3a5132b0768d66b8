//! Collects tokens from every known identity provider.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::cli::AzureCliIdentity;
use super::default::DefaultIdentity;
use super::provider::{AccessToken, IdentityProvider, IdentitySelector};
use super::system::SystemIdentity;
use crate::logging::{ActivityLog, LogArg};

/// Tokens keyed by selector; `None` where acquisition failed.
pub type TokenCollection = HashMap<IdentitySelector, Option<AccessToken>>;

/// Builds the fixed set of providers and queries each of them once.
pub struct AuthFactory;

impl AuthFactory {
    /// The providers queried by [`AuthFactory::load_authentication`].
    #[must_use]
    pub fn providers(
        endpoint: Option<String>,
        header: Option<String>,
    ) -> Vec<Arc<dyn IdentityProvider>> {
        vec![
            Arc::new(AzureCliIdentity::new()),
            Arc::new(DefaultIdentity::new(endpoint.clone(), header.clone())),
            Arc::new(SystemIdentity::new(endpoint, header)),
        ]
    }

    /// Acquires a token from every provider.
    ///
    /// Failures never propagate: they are logged as warnings and recorded
    /// as `None`.
    pub async fn load_authentication(
        endpoint: Option<String>,
        header: Option<String>,
        activity: &ActivityLog,
    ) -> TokenCollection {
        Self::collect(&Self::providers(endpoint, header), activity).await
    }

    /// Queries `providers` in order.
    pub async fn collect(
        providers: &[Arc<dyn IdentityProvider>],
        activity: &ActivityLog,
    ) -> TokenCollection {
        let mut tokens = TokenCollection::with_capacity(providers.len());

        for provider in providers {
            let selector = provider.selector();
            let token = match provider.get_token().await {
                Ok(token) => {
                    debug!(provider = %selector, "Acquired token");
                    Some(token)
                }
                Err(e) => {
                    warn!(provider = %selector, error = %e, "Unable to acquire token");
                    activity.warn([
                        LogArg::from(format!("Unable to acquire token for {selector}")),
                        LogArg::error(&e),
                    ]);
                    None
                }
            };
            tokens.insert(selector, token);
        }

        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::MockIdentityProvider;
    use crate::errors::AuthError;

    #[tokio::test]
    async fn test_failures_are_recorded_as_none() {
        let mut cli = MockIdentityProvider::new();
        cli.expect_selector().return_const(IdentitySelector::AzureCli);
        cli.expect_get_token().times(1).returning(|| {
            Err(AuthError::Command {
                provider: "AzureCliCredential".to_string(),
                reason: "Please run 'az login'".to_string(),
            })
        });

        let mut system = MockIdentityProvider::new();
        system.expect_selector().return_const(IdentitySelector::System);
        system
            .expect_get_token()
            .times(1)
            .returning(|| Ok(AccessToken::new("msi-token")));

        let providers: Vec<Arc<dyn IdentityProvider>> = vec![Arc::new(cli), Arc::new(system)];
        let tokens = AuthFactory::collect(&providers, &ActivityLog::disabled()).await;

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[&IdentitySelector::AzureCli], None);
        assert_eq!(
            tokens[&IdentitySelector::System].as_ref().map(AccessToken::secret),
            Some("msi-token")
        );
        assert!(!tokens.contains_key(&IdentitySelector::DefaultCredential));
    }

    #[test]
    fn test_fixed_provider_set() {
        let selectors: Vec<_> = AuthFactory::providers(None, None)
            .iter()
            .map(|p| p.selector())
            .collect();
        assert_eq!(selectors, IdentitySelector::ALL.to_vec());
    }
}
