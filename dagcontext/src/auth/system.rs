//! Managed identity tokens from the platform's identity endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{AccessToken, IdentityProvider, IdentitySelector};
use crate::config::constants::identity::{DEFAULT_IDENTITY_ENDPOINT, SYSTEM_IDENTITY_QUERY};
use crate::errors::AuthError;

/// Upper bound on a token request.
#[cfg(feature = "system-auth")]
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Token payload returned by the identity endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

impl TokenResponse {
    fn into_token(self) -> AccessToken {
        // The endpoint reports the expiry as a string or a number.
        let expires_on = match self.expires_on {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        };

        let token = AccessToken::new(self.access_token);
        match expires_on {
            Some(ts) => token.with_expires_on(ts),
            None => token,
        }
    }
}

/// Acquires tokens for the platform's managed identity.
#[derive(Debug, Clone)]
pub struct SystemIdentity {
    endpoint: String,
    header: Option<String>,
    #[cfg(feature = "system-auth")]
    client: reqwest::Client,
}

impl SystemIdentity {
    /// Creates the provider; without an endpoint the well-known metadata
    /// endpoint is used.
    #[must_use]
    pub fn new(endpoint: Option<String>, header: Option<String>) -> Self {
        Self {
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_IDENTITY_ENDPOINT.to_string()),
            header,
            #[cfg(feature = "system-auth")]
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// The full token URL requested.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}?{SYSTEM_IDENTITY_QUERY}", self.endpoint)
    }

    #[cfg(feature = "system-auth")]
    async fn request_token(&self) -> Result<AccessToken, AuthError> {
        let url = self.url();
        let mut request = self.client.get(&url).header("Metadata", "true");
        if let Some(header) = &self.header {
            request = request.header("X-IDENTITY-HEADER", header);
        }

        let response = request.send().await.map_err(|e| AuthError::Request {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AuthError::EndpointStatus {
                endpoint: url,
                status: status.as_u16(),
            });
        }

        let body: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::MalformedResponse {
                    provider: IdentitySelector::System.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(body.into_token())
    }
}

#[async_trait]
impl IdentityProvider for SystemIdentity {
    fn selector(&self) -> IdentitySelector {
        IdentitySelector::System
    }

    #[cfg(feature = "system-auth")]
    async fn get_token(&self) -> Result<AccessToken, AuthError> {
        self.request_token().await
    }

    #[cfg(not(feature = "system-auth"))]
    async fn get_token(&self) -> Result<AccessToken, AuthError> {
        Err(AuthError::Unavailable {
            provider: IdentitySelector::System.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_url() {
        let identity = SystemIdentity::new(None, None);
        assert_eq!(
            identity.url(),
            "http://169.254.169.254/metadata/identity/oauth2/token?api-version=2018-02-01&resource=https%3A%2F%2Fmanagement.azure.com%2F"
        );
    }

    #[test]
    fn test_token_response_expiry_formats() {
        let numeric: TokenResponse =
            serde_json::from_str(r#"{"access_token": "a", "expires_on": 1700000000}"#).unwrap();
        assert_eq!(numeric.into_token().expires_on(), Some(1_700_000_000));

        let text: TokenResponse =
            serde_json::from_str(r#"{"access_token": "b", "expires_on": "1700000001"}"#).unwrap();
        assert_eq!(text.into_token().expires_on(), Some(1_700_000_001));

        let bare: TokenResponse = serde_json::from_str(r#"{"access_token": "c"}"#).unwrap();
        assert_eq!(bare.into_token().secret(), "c");
    }

    #[cfg(feature = "system-auth")]
    mod http {
        use super::super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        /// Serves one canned HTTP response and returns the request it saw.
        async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            let handle = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0_u8; 4096];
                let n = socket.read(&mut buf).await.unwrap();
                let response = format!(
                    "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                String::from_utf8_lossy(&buf[..n]).to_string()
            });

            (format!("http://{addr}/token"), handle)
        }

        #[tokio::test]
        async fn test_token_from_endpoint() {
            let (endpoint, server) =
                serve_once("HTTP/1.1 200 OK", r#"{"access_token": "tok-123"}"#).await;
            let identity = SystemIdentity::new(Some(endpoint), Some("hdr".to_string()));

            let token = identity.get_token().await.unwrap();
            assert_eq!(token.secret(), "tok-123");

            let request = server.await.unwrap().to_lowercase();
            assert!(request.contains("metadata: true"));
            assert!(request.contains("x-identity-header: hdr"));
            assert!(request.contains("api-version=2018-02-01"));
        }

        #[tokio::test]
        async fn test_non_200_is_an_error() {
            let (endpoint, _server) = serve_once("HTTP/1.1 500 Internal Server Error", "{}").await;
            let identity = SystemIdentity::new(Some(endpoint), None);

            let err = identity.get_token().await.unwrap_err();
            assert!(matches!(err, AuthError::EndpointStatus { status: 500, .. }));
        }

        #[tokio::test]
        async fn test_unreachable_endpoint() {
            let identity = SystemIdentity::new(Some("http://127.0.0.1:1/token".to_string()), None);
            let err = identity.get_token().await.unwrap_err();
            assert!(matches!(err, AuthError::Request { .. }));
        }
    }
}
