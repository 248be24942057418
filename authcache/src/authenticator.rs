//! Process-facing entry point
//!
//! [`Authenticator`] bundles the coordinator with a verifier so a service can
//! authenticate requests and look up service accounts through one handle,
//! while the update feed pushes snapshots through [`Authenticator::coordinator`].

use crate::coordinator::Coordinator;
use crate::credential::Credential;
use crate::http::{extract_basic_credentials, session_token_from_headers, split_host_port};
use crate::service_auth::{find_service_auth, ServiceCredentials};
use crate::session::{HttpSessionVerifier, SessionVerifier};
use crate::verifier::Verifier;
use authcache_core::{AuthCacheConfig, AuthError, AuthResult};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Authenticator {
    coordinator: Arc<Coordinator>,
    verifier: Verifier,
}

impl Authenticator {
    /// Build from configuration with the HTTP session verifier.
    ///
    /// The grace period starts now.
    pub fn from_config(config: &AuthCacheConfig) -> AuthResult<Self> {
        let session = HttpSessionVerifier::new(&config.http)?;
        let coordinator = Arc::new(Coordinator::new(config.coordinator.grace_period()));
        info!(
            grace_period_ms = config.coordinator.grace_period_ms,
            "Auth cache started"
        );
        Ok(Self::new(coordinator, Arc::new(session)))
    }

    pub fn new(coordinator: Arc<Coordinator>, session: Arc<dyn SessionVerifier>) -> Self {
        let verifier = Verifier::new(Arc::clone(&coordinator), session);
        Self {
            coordinator,
            verifier,
        }
    }

    /// Ingestion handle for the update feed
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Verify a user/password pair; both empty means anonymous
    pub async fn auth(&self, user: &str, password: &str) -> AuthResult<Credential> {
        self.verifier.verify_password(user, password).await
    }

    /// Verify an inbound web request: UI session if marked, basic auth otherwise
    pub async fn auth_web_creds(&self, headers: &HeaderMap) -> AuthResult<Credential> {
        if let Some(token) = session_token_from_headers(headers) {
            debug!("Verifying UI session");
            return self.verifier.verify_session(&token).await;
        }

        let (user, password) = extract_basic_credentials(headers)?;
        self.auth(&user, &password).await
    }

    /// `(node_user, password)` for the memcached data path of `hostport`
    pub async fn memcached_service_auth(&self, hostport: &str) -> AuthResult<(String, String)> {
        let ServiceCredentials {
            node_user,
            password,
            ..
        } = self.service_auth(hostport).await?;
        Ok((node_user, password))
    }

    /// `(special_user, password)` for the HTTP management path of `hostport`
    pub async fn http_service_auth(&self, hostport: &str) -> AuthResult<(String, String)> {
        let ServiceCredentials {
            http_user,
            password,
            ..
        } = self.service_auth(hostport).await?;
        Ok((http_user, password))
    }

    /// Full service credentials for `hostport`
    pub async fn service_auth(&self, hostport: &str) -> AuthResult<ServiceCredentials> {
        let (host, port) = split_host_port(hostport)?;
        let snapshot = self.coordinator.read().await?;
        find_service_auth(&snapshot, &host, port)
            .ok_or_else(|| AuthError::UnknownHostPort(hostport.to_string()))
    }
}
