//! Unified error handling
//!
//! One error type crosses the boundary between the cache engine and its
//! callers. Each variant maps to a distinct caller reaction: wait for the feed
//! (`Stale`), reject the request (`NoSuchIdentity`), fix the address
//! (`UnknownHostPort`), or retry the outbound call (`Transport`).

use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

pub type AuthResult<T> = Result<T, AuthError>;

/// The cached auth database is not (or no longer) trustworthy.
///
/// Cloneable so that every reader blocked on the same freshness event can
/// receive its own copy of the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleError {
    /// Last failure reported by the update feed, if any.
    pub last_reason: Option<String>,
}

impl StaleError {
    pub fn new(last_reason: Option<String>) -> Self {
        Self { last_reason }
    }
}

impl fmt::Display for StaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_reason {
            Some(reason) => write!(f, "auth database is stale: last reason: {}", reason),
            None => write!(f, "auth database is stale: never updated yet"),
        }
    }
}

impl std::error::Error for StaleError {}

/// Main error type for authcache
#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Stale(#[from] StaleError),

    #[error("no such identity")]
    NoSuchIdentity,

    #[error("Unable to find given hostport in auth database: `{0}'")]
    UnknownHostPort(String),

    #[error("invalid host:port `{hostport}': {reason}")]
    InvalidHostPort { hostport: String, reason: String },

    #[error("invalid credentials: {reason}")]
    InvalidCredentials { reason: String },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthError {
    /// Build a transport error around the underlying client failure
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AuthError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, AuthError::Stale(_))
    }

    /// Check if retrying the same call later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            AuthError::Stale(_) => true,
            AuthError::Transport { .. } => true,
            AuthError::NoSuchIdentity => false,
            AuthError::UnknownHostPort(_) => false,
            AuthError::InvalidHostPort { .. } => false,
            AuthError::InvalidCredentials { .. } => false,
            AuthError::Config { .. } => false,
            AuthError::Io(_) => false,
            AuthError::Serialization(_) => false,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AuthError::NoSuchIdentity | AuthError::InvalidCredentials { .. } => {
                debug!(error = %self, "Credentials rejected");
            }
            AuthError::Stale(_) | AuthError::Transport { .. } => {
                warn!(error = %self, "Auth database unavailable (may be recoverable)");
            }
            AuthError::UnknownHostPort(_) | AuthError::InvalidHostPort { .. } => {
                warn!(error = %self, "Service credential lookup failed");
            }
            _ => {
                error!(error = %self, "Error occurred");
            }
        }
    }
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::AuthError::Config {
            message: $msg.to_string(),
            source: None,
        }
    };
    ($msg:expr, $source:expr) => {
        $crate::AuthError::Config {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
        }
    };
}
