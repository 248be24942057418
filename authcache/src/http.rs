//! Helpers for inbound HTTP requests and addresses

use crate::session::{SessionToken, SESSION_COOKIE, SESSION_MARKER_HEADER, SESSION_MARKER_VALUE};
use authcache_core::{AuthError, AuthResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, AUTHORIZATION, COOKIE};

/// Split `host:port`, accepting `[v6]:port` for IPv6 literals
pub fn split_host_port(hostport: &str) -> AuthResult<(String, u16)> {
    let invalid = |reason: &str| AuthError::InvalidHostPort {
        hostport: hostport.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = if let Some(rest) = hostport.strip_prefix('[') {
        let (host, port) = rest
            .split_once("]:")
            .ok_or_else(|| invalid("missing port after IPv6 address"))?;
        (host, port)
    } else {
        let (host, port) = hostport
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.contains(':') {
            return Err(invalid("too many colons; bracket IPv6 addresses"));
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| invalid("port is not a number between 0 and 65535"))?;

    Ok((host.to_string(), port))
}

/// User and password from an `Authorization: Basic` header.
///
/// A request without the header is anonymous and yields two empty strings.
pub fn extract_basic_credentials(headers: &HeaderMap) -> AuthResult<(String, String)> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok((String::new(), String::new()));
    };

    let invalid = |reason: &str| AuthError::InvalidCredentials {
        reason: reason.to_string(),
    };

    let value = value
        .to_str()
        .map_err(|_| invalid("authorization header is not ASCII"))?;
    let (scheme, encoded) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| invalid("malformed authorization header"))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(invalid("unsupported authorization scheme"));
    }

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| invalid("basic credentials are not valid base64"))?;
    let decoded =
        String::from_utf8(decoded).map_err(|_| invalid("basic credentials are not UTF-8"))?;
    let (user, password) = decoded
        .split_once(':')
        .ok_or_else(|| invalid("basic credentials lack a ':' separator"))?;

    Ok((user.to_string(), password.to_string()))
}

/// The UI session token, if the request carries the session marker and cookie
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<SessionToken> {
    let marked = headers
        .get(SESSION_MARKER_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == SESSION_MARKER_VALUE);
    if !marked {
        return None;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| SessionToken::new(token))
}
