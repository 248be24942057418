//! authcache - per-process cache of the cluster auth database
//!
//! An external update feed pushes [`Snapshot`]s into a [`Coordinator`];
//! request handlers verify credentials against the latest snapshot without a
//! network round-trip. Until the first snapshot arrives, readers wait up to a
//! grace period and then fail with a stale error.
//!
//! ```no_run
//! use authcache::{Authenticator, AuthCacheConfig, Snapshot};
//!
//! # async fn run(feed_payload: &[u8]) -> authcache::AuthResult<()> {
//! let auth = Authenticator::from_config(&AuthCacheConfig::default())?;
//! auth.coordinator().push(Snapshot::from_json(feed_payload)?);
//!
//! let credential = auth.auth("foo", "bar").await?;
//! if credential.is_allowed("cluster.bucket[foo].data!write") {
//!     // serve the request
//! }
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
mod client;
pub mod coordinator;
pub mod credential;
pub mod http;
pub mod password;
pub mod permissions;
pub mod service_auth;
pub mod session;
pub mod snapshot;
pub mod verifier;

pub use authenticator::Authenticator;
pub use coordinator::{Coordinator, Freshness};
pub use credential::{Credential, Scope};
pub use http::{extract_basic_credentials, session_token_from_headers, split_host_port};
pub use password::{hash_password, verify_password};
pub use permissions::{
    is_allowed, LocalPolicy, Permission, PermissionPolicy, RemotePermissionPolicy,
};
pub use service_auth::{find_service_auth, resolve_service_auth, ServiceCredentials};
pub use session::{HttpSessionVerifier, SessionIdentity, SessionToken, SessionVerifier};
pub use snapshot::{Bucket, Node, Snapshot, SnapshotBuilder, User, UserType};
pub use verifier::Verifier;

pub use authcache_core::{AuthCacheConfig, AuthError, AuthResult, StaleError};
