//! Verified identities

use crate::permissions;
use serde::Serialize;

/// Source label for anonymous access to the open `default` bucket
pub const SOURCE_ANONYMOUS: &str = "anonymous";
/// Source label for built-in users
pub const SOURCE_BUILTIN: &str = "builtin";
/// Source label for bucket credentials
pub const SOURCE_BUCKET: &str = "bucket";

/// What a verified identity is authorized to do
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "bucket", rename_all = "snake_case")]
pub enum Scope {
    /// Every permission; also granted to sessions vouched for by the cluster manager
    FullAdmin,
    /// Security settings may be read, nothing else
    ReadOnlyAdmin,
    /// Data access to a single bucket
    Bucket(String),
    /// Authenticated, but no permissions
    None,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::FullAdmin => write!(f, "full-admin"),
            Scope::ReadOnlyAdmin => write!(f, "readonly-admin"),
            Scope::Bucket(name) => write!(f, "bucket[{}]", name),
            Scope::None => write!(f, "none"),
        }
    }
}

/// A verified identity together with its authorization scope.
///
/// Produced once per verification call and never cached; the scope is fixed
/// at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    name: String,
    source: String,
    scope: Scope,
}

impl Credential {
    pub fn new(name: impl Into<String>, source: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            scope,
        }
    }

    /// User name, for auditing
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the identity came from, for auditing
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Evaluate `permission` against this credential's scope locally
    pub fn is_allowed(&self, permission: &str) -> bool {
        permissions::is_allowed(self, permission)
    }
}
