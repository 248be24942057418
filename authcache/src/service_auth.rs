//! Inter-node service credentials

use crate::snapshot::Snapshot;
use authcache_core::{AuthError, AuthResult};
use serde::Serialize;

/// Account a component uses to reach a given node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCredentials {
    /// Node's own user, for the data path
    pub node_user: String,
    /// Snapshot-wide special user, for the management path
    pub http_user: String,
    pub password: String,
}

/// Find credentials for `host:port` by scanning nodes in feed order.
///
/// Matching is literal: `localhost` does not match the local node's address.
pub fn resolve_service_auth(
    snapshot: &Snapshot,
    host: &str,
    port: u16,
) -> AuthResult<ServiceCredentials> {
    find_service_auth(snapshot, host, port)
        .ok_or_else(|| AuthError::UnknownHostPort(join_host_port(host, port)))
}

/// Lookup without an error; callers holding the raw `host:port` report it as given
pub fn find_service_auth(snapshot: &Snapshot, host: &str, port: u16) -> Option<ServiceCredentials> {
    snapshot
        .nodes()
        .iter()
        .find(|node| node.serves(host, port))
        .map(|node| ServiceCredentials {
            node_user: node.user.clone(),
            http_user: snapshot.special_user().to_string(),
            password: node.password.clone(),
        })
}

/// Inverse of [`crate::http::split_host_port`]; brackets IPv6 literals
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
