//! UI session verification
//!
//! A browser session is vouched for by the cluster manager: the token is sent
//! back to the auth-check endpoint named in the snapshot, which answers with
//! the user behind it.

use crate::client::create_http_client;
use async_trait::async_trait;
use authcache_core::{AuthError, AuthResult, HttpClientConfig};
use reqwest::header::{HeaderValue, COOKIE};
use serde::Deserialize;
use tracing::debug;

/// Header marking a request as coming from the management UI
pub const SESSION_MARKER_HEADER: &str = "ns-server-ui";
/// Value the marker header must carry
pub const SESSION_MARKER_VALUE: &str = "yes";
/// Cookie holding the UI session token
pub const SESSION_COOKIE: &str = "ui-auth-q";

/// Opaque UI session token
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Identity returned by the auth-check endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionIdentity {
    pub user: String,
    pub source: String,
}

/// Confirms a session token with the cluster manager
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// One attempt, no retries. A rejected token is `NoSuchIdentity`; a failed
    /// exchange is `Transport`.
    async fn verify(&self, auth_check_url: &str, token: &SessionToken)
        -> AuthResult<SessionIdentity>;
}

/// [`SessionVerifier`] posting the token to the auth-check endpoint over HTTP
#[derive(Debug, Clone)]
pub struct HttpSessionVerifier {
    client: reqwest::Client,
}

impl HttpSessionVerifier {
    pub fn new(config: &HttpClientConfig) -> AuthResult<Self> {
        Ok(Self {
            client: create_http_client(config)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionVerifier for HttpSessionVerifier {
    async fn verify(
        &self,
        auth_check_url: &str,
        token: &SessionToken,
    ) -> AuthResult<SessionIdentity> {
        let cookie = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token.as_str()))
            .map_err(|e| AuthError::InvalidCredentials {
                reason: format!("session token is not a valid cookie value: {}", e),
            })?;

        let response = self
            .client
            .post(auth_check_url)
            .header(SESSION_MARKER_HEADER, SESSION_MARKER_VALUE)
            .header(COOKIE, cookie)
            .send()
            .await
            .map_err(|e| AuthError::transport("Auth check request failed", e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            debug!(status = status.as_u16(), "Session rejected by auth check");
            return Err(AuthError::NoSuchIdentity);
        }

        response
            .json::<SessionIdentity>()
            .await
            .map_err(|e| AuthError::transport("Failed to decode auth check response", e))
    }
}
