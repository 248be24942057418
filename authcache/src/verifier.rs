//! Credential verification against the current snapshot

use crate::coordinator::Coordinator;
use crate::credential::{Credential, Scope, SOURCE_ANONYMOUS, SOURCE_BUCKET, SOURCE_BUILTIN};
use crate::session::{SessionToken, SessionVerifier};
use crate::snapshot::{Snapshot, UserType};
use authcache_core::{AuthError, AuthResult};
use std::sync::Arc;
use tracing::debug;

/// Bucket that anonymous callers may reach when it has no password
pub const DEFAULT_BUCKET: &str = "default";

/// Turns a user/password pair or a UI session token into a [`Credential`].
///
/// Every call reads the coordinator first, so it may block during the grace
/// period and fails stale once it has run out.
#[derive(Clone)]
pub struct Verifier {
    coordinator: Arc<Coordinator>,
    session: Arc<dyn SessionVerifier>,
}

impl Verifier {
    pub fn new(coordinator: Arc<Coordinator>, session: Arc<dyn SessionVerifier>) -> Self {
        Self {
            coordinator,
            session,
        }
    }

    /// Password path; an empty user and password is an anonymous attempt
    pub async fn verify_password(&self, user: &str, password: &str) -> AuthResult<Credential> {
        let snapshot = self.coordinator.read().await?;

        let result = check_password(&snapshot, user, password);
        match &result {
            Ok(credential) => debug!(
                user = credential.name(),
                source = credential.source(),
                scope = %credential.scope(),
                "Password verified"
            ),
            Err(_) => debug!(user, "Password rejected"),
        }
        result
    }

    /// Token path; the cluster manager decides, the snapshot only names where to ask
    pub async fn verify_session(&self, token: &SessionToken) -> AuthResult<Credential> {
        let snapshot = self.coordinator.read().await?;

        let auth_check_url = snapshot.auth_check_url();
        if auth_check_url.is_empty() {
            debug!("No auth check URL in snapshot; rejecting session");
            return Err(AuthError::NoSuchIdentity);
        }

        let identity = self.session.verify(auth_check_url, token).await?;
        debug!(
            user = %identity.user,
            source = %identity.source,
            "Session verified"
        );

        Ok(Credential::new(
            identity.user,
            identity.source,
            Scope::FullAdmin,
        ))
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

/// Password rules applied to one snapshot: anonymous, then built-in users,
/// then bucket credentials.
pub fn check_password(snapshot: &Snapshot, user: &str, password: &str) -> AuthResult<Credential> {
    if user.is_empty() && password.is_empty() {
        return match snapshot.bucket(DEFAULT_BUCKET) {
            Some(bucket) if bucket.is_open() => Ok(Credential::new(
                DEFAULT_BUCKET,
                SOURCE_ANONYMOUS,
                Scope::Bucket(DEFAULT_BUCKET.to_string()),
            )),
            _ => Err(AuthError::NoSuchIdentity),
        };
    }

    if let Some(builtin) = snapshot.user(user) {
        if !builtin.verify_password(password) {
            return Err(AuthError::NoSuchIdentity);
        }
        let scope = match builtin.user_type {
            UserType::Admin => Scope::FullAdmin,
            UserType::ReadOnlyAdmin => Scope::ReadOnlyAdmin,
            UserType::Other(_) => Scope::None,
        };
        return Ok(Credential::new(user, SOURCE_BUILTIN, scope));
    }

    match snapshot.bucket(user) {
        Some(bucket) if bucket.password == password => Ok(Credential::new(
            user,
            SOURCE_BUCKET,
            Scope::Bucket(user.to_string()),
        )),
        _ => Err(AuthError::NoSuchIdentity),
    }
}
