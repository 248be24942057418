//! Immutable auth database snapshot
//!
//! A [`Snapshot`] is produced wholesale by the update feed and replaced as a
//! whole by the coordinator. Nothing in this module mutates a snapshot after
//! [`SnapshotBuilder::build`] returns.

use crate::password;
use authcache_core::AuthResult;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Built-in user classification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserType {
    /// Full cluster administrator
    Admin,
    /// Read-only administrator
    ReadOnlyAdmin,
    /// Any other account type; carries no implicit privileges
    Other(String),
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Admin => write!(f, "admin"),
            UserType::ReadOnlyAdmin => write!(f, "ro_admin"),
            UserType::Other(name) => write!(f, "{}", name),
        }
    }
}

impl std::str::FromStr for UserType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "admin" => UserType::Admin,
            "ro_admin" | "readonly-admin" | "readonly_admin" => UserType::ReadOnlyAdmin,
            other => UserType::Other(other.to_string()),
        })
    }
}

impl From<&str> for UserType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(user_type) => user_type,
            Err(never) => match never {},
        }
    }
}

/// Built-in user with a salted password digest
#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    pub user_type: UserType,
    pub salt: Vec<u8>,
    pub digest: Vec<u8>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        user_type: UserType,
        salt: Vec<u8>,
        digest: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            user_type,
            salt,
            digest,
        }
    }

    /// Create a user whose digest is derived from a plaintext password
    pub fn with_password(
        name: impl Into<String>,
        user_type: UserType,
        password: &str,
        salt: impl Into<Vec<u8>>,
    ) -> Self {
        let salt = salt.into();
        let digest = password::hash_password(password, &salt);
        Self::new(name, user_type, salt, digest)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        password::verify_password(password, &self.salt, &self.digest)
    }
}

/// Bucket credentials; an empty password means no authentication required
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Bucket {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Password", default)]
    pub password: String,
}

impl Bucket {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

/// Cluster node with the service account other nodes use to reach it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Node {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Ports", default, deserialize_with = "valid_ports")]
    pub ports: BTreeSet<u16>,
    #[serde(rename = "User", default)]
    pub user: String,
    #[serde(rename = "Password", default)]
    pub password: String,
    #[serde(rename = "Local", default)]
    pub local: bool,
}

impl Node {
    pub fn new(
        host: impl Into<String>,
        ports: impl IntoIterator<Item = u16>,
        user: impl Into<String>,
        password: impl Into<String>,
        local: bool,
    ) -> Self {
        Self {
            host: host.into(),
            ports: ports.into_iter().collect(),
            user: user.into(),
            password: password.into(),
            local,
        }
    }

    pub fn serves(&self, host: &str, port: u16) -> bool {
        self.host == host && self.ports.contains(&port)
    }
}

/// Point-in-time copy of the cluster's identity and credential data
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    users: HashMap<String, User>,
    buckets: HashMap<String, Bucket>,
    nodes: Vec<Node>,
    special_user: String,
    auth_check_url: String,
    permission_check_url: String,
}

impl Snapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Decode a snapshot from the update feed's JSON payload
    pub fn from_json(bytes: &[u8]) -> AuthResult<Self> {
        let payload: SnapshotPayload = serde_json::from_slice(bytes)?;
        Ok(payload.into_snapshot())
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    pub fn bucket(&self, name: &str) -> Option<&Bucket> {
        self.buckets.get(name)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    /// Nodes in feed order; service lookups take the first match
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The node describing this process's own host, if the feed marked one
    pub fn local_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| node.local)
    }

    pub fn special_user(&self) -> &str {
        &self.special_user
    }

    pub fn auth_check_url(&self) -> &str {
        &self.auth_check_url
    }

    pub fn permission_check_url(&self) -> &str {
        &self.permission_check_url
    }
}

/// Assembles a [`Snapshot`]; later entries replace earlier ones of the same name
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn user(mut self, user: User) -> Self {
        self.snapshot.users.insert(user.name.clone(), user);
        self
    }

    pub fn bucket(mut self, bucket: Bucket) -> Self {
        self.snapshot.buckets.insert(bucket.name.clone(), bucket);
        self
    }

    pub fn node(mut self, node: Node) -> Self {
        self.snapshot.nodes.push(node);
        self
    }

    pub fn special_user(mut self, special_user: impl Into<String>) -> Self {
        self.snapshot.special_user = special_user.into();
        self
    }

    pub fn auth_check_url(mut self, url: impl Into<String>) -> Self {
        self.snapshot.auth_check_url = url.into();
        self
    }

    pub fn permission_check_url(mut self, url: impl Into<String>) -> Self {
        self.snapshot.permission_check_url = url.into();
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

/// Wire shape of the update feed payload
#[derive(Debug, Deserialize)]
struct SnapshotPayload {
    #[serde(rename = "Users", default, deserialize_with = "null_as_empty")]
    users: Vec<UserPayload>,
    #[serde(rename = "Buckets", default, deserialize_with = "null_as_empty")]
    buckets: Vec<Bucket>,
    #[serde(rename = "Nodes", default, deserialize_with = "null_as_empty")]
    nodes: Vec<Node>,
    #[serde(rename = "SpecialUser", default)]
    special_user: String,
    #[serde(rename = "AuthCheckURL", default)]
    auth_check_url: String,
    #[serde(rename = "PermissionCheckURL", default)]
    permission_check_url: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(rename = "User")]
    name: String,
    #[serde(rename = "Type", default)]
    user_type: String,
    #[serde(rename = "Salt", default, deserialize_with = "base64_bytes")]
    salt: Vec<u8>,
    #[serde(rename = "Mac", default, deserialize_with = "base64_bytes")]
    digest: Vec<u8>,
}

impl SnapshotPayload {
    fn into_snapshot(self) -> Snapshot {
        let builder = Snapshot::builder()
            .special_user(self.special_user)
            .auth_check_url(self.auth_check_url)
            .permission_check_url(self.permission_check_url);

        let builder = self.users.into_iter().fold(builder, |builder, user| {
            builder.user(User::new(
                user.name,
                UserType::from(user.user_type.as_str()),
                user.salt,
                user.digest,
            ))
        });
        let builder = self
            .buckets
            .into_iter()
            .fold(builder, |builder, bucket| builder.bucket(bucket));
        self.nodes
            .into_iter()
            .fold(builder, |builder, node| builder.node(node))
            .build()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ports outside the u16 range are dropped instead of rejecting the payload
fn valid_ports<'de, D>(deserializer: D) -> Result<BTreeSet<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<i64>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|port| match u16::try_from(port) {
            Ok(port) => Some(port),
            Err(_) => {
                warn!(port, "Ignoring out-of-range node port");
                None
            }
        })
        .collect())
}

fn base64_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(encoded) => BASE64.decode(encoded).map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}
