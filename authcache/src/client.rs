//! Outbound HTTP client construction

use authcache_core::{AuthError, AuthResult, HttpClientConfig};

/// Build the HTTP client used for session and permission checks
pub(crate) fn create_http_client(config: &HttpClientConfig) -> AuthResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            AuthError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
            }
        })?,
    );

    reqwest::Client::builder()
        .timeout(config.timeout())
        .default_headers(headers)
        .build()
        .map_err(|e| AuthError::Config {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
        })
}
