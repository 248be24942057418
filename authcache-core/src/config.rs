//! Configuration management

use crate::error::{AuthError, AuthResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for a process embedding the auth cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthCacheConfig {
    pub coordinator: CoordinatorConfig,
    pub http: HttpClientConfig,
    pub logging: LoggingConfig,
}

/// Freshness coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long readers may wait for the first snapshot before failing stale
    pub grace_period_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 5000,
        }
    }
}

impl CoordinatorConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Outbound HTTP client settings (session and permission checks)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("authcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl AuthCacheConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AuthResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AuthError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AuthResult<Self> {
        toml::from_str(content).map_err(|e| AuthError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AuthResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| AuthError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
        })?;

        std::fs::write(path, content).map_err(|e| AuthError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> AuthResult<()> {
        if self.http.timeout_seconds == 0 {
            return Err(crate::config_error!(
                "http.timeout_seconds must be greater than 0"
            ));
        }

        if self.http.user_agent.trim().is_empty() {
            return Err(crate::config_error!("http.user_agent must not be empty"));
        }

        Ok(())
    }
}
