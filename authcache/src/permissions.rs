//! Permission evaluation
//!
//! Permissions are dotted strings with a fixed set of shapes:
//!
//! - `cluster.admin.settings!write`
//! - `cluster.admin.security!read`
//! - `cluster.bucket[<name>].<action>`
//!
//! [`is_allowed`] decides them locally from the credential's scope. The
//! [`PermissionPolicy`] trait lets a caller swap in the cluster manager's own
//! permission endpoint ([`RemotePermissionPolicy`]) instead.

use crate::client::create_http_client;
use crate::coordinator::Coordinator;
use crate::credential::{Credential, Scope};
use async_trait::async_trait;
use authcache_core::{AuthError, AuthResult, HttpClientConfig};
use std::sync::Arc;
use tracing::debug;

const ADMIN_SETTINGS_WRITE: &str = "cluster.admin.settings!write";
const ADMIN_SECURITY_READ: &str = "cluster.admin.security!read";
const BUCKET_PREFIX: &str = "cluster.bucket[";

/// A parsed permission string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Permission {
    AdminSettingsWrite,
    AdminSecurityRead,
    Bucket { name: String, action: String },
    /// Any shape not listed above; only full admins hold it
    Other(String),
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::AdminSettingsWrite => write!(f, "{}", ADMIN_SETTINGS_WRITE),
            Permission::AdminSecurityRead => write!(f, "{}", ADMIN_SECURITY_READ),
            Permission::Bucket { name, action } => {
                write!(f, "{}{}].{}", BUCKET_PREFIX, name, action)
            }
            Permission::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Permission::parse(s))
    }
}

impl Permission {
    pub fn parse(s: &str) -> Self {
        match s {
            ADMIN_SETTINGS_WRITE => return Permission::AdminSettingsWrite,
            ADMIN_SECURITY_READ => return Permission::AdminSecurityRead,
            _ => {}
        }

        if let Some(rest) = s.strip_prefix(BUCKET_PREFIX) {
            if let Some((name, action)) = rest.split_once("].") {
                if !name.is_empty() && !action.is_empty() {
                    return Permission::Bucket {
                        name: name.to_string(),
                        action: action.to_string(),
                    };
                }
            }
        }

        Permission::Other(s.to_string())
    }
}

/// Decide `permission` for `credential` from its scope alone.
///
/// Pure and deterministic: no I/O, no dependence on the coordinator.
pub fn is_allowed(credential: &Credential, permission: &str) -> bool {
    match (credential.scope(), Permission::parse(permission)) {
        (Scope::FullAdmin, _) => true,
        (Scope::ReadOnlyAdmin, Permission::AdminSecurityRead) => true,
        (Scope::Bucket(bucket), Permission::Bucket { name, .. }) => *bucket == name,
        _ => false,
    }
}

/// Where permission decisions are made
#[async_trait]
pub trait PermissionPolicy: Send + Sync {
    async fn is_allowed(&self, credential: &Credential, permission: &str) -> AuthResult<bool>;
}

/// Decides from the credential's scope, without leaving the process
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPolicy;

#[async_trait]
impl PermissionPolicy for LocalPolicy {
    async fn is_allowed(&self, credential: &Credential, permission: &str) -> AuthResult<bool> {
        Ok(is_allowed(credential, permission))
    }
}

/// Asks the cluster manager's permission endpoint named in the current snapshot.
///
/// `200` grants, `401` denies; any other status is reported as a transport
/// error. Reading the endpoint URL goes through the coordinator and so may
/// block or fail stale like any verification.
pub struct RemotePermissionPolicy {
    coordinator: Arc<Coordinator>,
    client: reqwest::Client,
}

impl RemotePermissionPolicy {
    pub fn new(coordinator: Arc<Coordinator>, config: &HttpClientConfig) -> AuthResult<Self> {
        Ok(Self {
            coordinator,
            client: create_http_client(config)?,
        })
    }
}

#[async_trait]
impl PermissionPolicy for RemotePermissionPolicy {
    async fn is_allowed(&self, credential: &Credential, permission: &str) -> AuthResult<bool> {
        let snapshot = self.coordinator.read().await?;

        let url = url::Url::parse_with_params(
            snapshot.permission_check_url(),
            &[
                ("permission", permission),
                ("user", credential.name()),
                ("src", credential.source()),
            ],
        )
        .map_err(|e| AuthError::transport("Invalid permission check URL", e))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::transport("Permission check request failed", e))?;

        let status = response.status();
        debug!(
            user = credential.name(),
            permission,
            status = status.as_u16(),
            "Remote permission check"
        );

        match status {
            reqwest::StatusCode::OK => Ok(true),
            reqwest::StatusCode::UNAUTHORIZED => Ok(false),
            other => Err(AuthError::Transport {
                message: format!("Unexpected permission check status: {}", other),
                source: None,
            }),
        }
    }
}
