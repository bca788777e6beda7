//! Authentication providers
//!
//! An authenticator contributes headers and/or query parameters that are
//! merged over whatever the request options provider produced, so auth
//! always wins a conflict. Values are resolved against the connector config
//! once, at construction time.

use base64::Engine as _;
use std::collections::HashMap;

/// Supplies auth headers/params for outgoing requests
pub trait Authenticator: Send + Sync {
    /// Headers to merge into the request (override on conflict)
    fn auth_headers(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    /// Query parameters to merge into the request (override on conflict)
    fn auth_params(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

// ============================================================================
// No auth
// ============================================================================

/// No authentication
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl Authenticator for NoAuth {}

// ============================================================================
// API key
// ============================================================================

/// API key injected as a header or query parameter
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    name: String,
    value: String,
    in_header: bool,
}

impl ApiKeyAuth {
    /// API key sent as a header, e.g. `X-API-Key`
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            in_header: true,
        }
    }

    /// API key sent as a query parameter, e.g. `?api_key=...`
    pub fn query_param(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            in_header: false,
        }
    }
}

impl Authenticator for ApiKeyAuth {
    fn auth_headers(&self) -> HashMap<String, String> {
        if self.in_header {
            HashMap::from([(self.name.clone(), self.value.clone())])
        } else {
            HashMap::new()
        }
    }

    fn auth_params(&self) -> HashMap<String, String> {
        if self.in_header {
            HashMap::new()
        } else {
            HashMap::from([(self.name.clone(), self.value.clone())])
        }
    }
}

// ============================================================================
// Bearer token
// ============================================================================

/// Static bearer token in the Authorization header
#[derive(Debug, Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    /// Create a bearer authenticator
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authenticator for BearerAuth {
    fn auth_headers(&self) -> HashMap<String, String> {
        HashMap::from([(
            "Authorization".to_string(),
            format!("Bearer {}", self.token),
        )])
    }
}

// ============================================================================
// Basic
// ============================================================================

/// HTTP basic auth
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: Option<String>,
}

impl BasicAuth {
    /// Create a basic authenticator
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl Authenticator for BasicAuth {
    fn auth_headers(&self) -> HashMap<String, String> {
        let credentials = format!(
            "{}:{}",
            self.username,
            self.password.as_deref().unwrap_or("")
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        HashMap::from([("Authorization".to_string(), format!("Basic {encoded}"))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_auth_is_empty() {
        assert!(NoAuth.auth_headers().is_empty());
        assert!(NoAuth.auth_params().is_empty());
    }

    #[test]
    fn test_api_key_header() {
        let auth = ApiKeyAuth::header("X-API-Key", "secret");
        assert_eq!(auth.auth_headers().get("X-API-Key").unwrap(), "secret");
        assert!(auth.auth_params().is_empty());
    }

    #[test]
    fn test_api_key_query_param() {
        let auth = ApiKeyAuth::query_param("api_key", "secret");
        assert_eq!(auth.auth_params().get("api_key").unwrap(), "secret");
        assert!(auth.auth_headers().is_empty());
    }

    #[test]
    fn test_bearer() {
        let auth = BearerAuth::new("tok_123");
        assert_eq!(
            auth.auth_headers().get("Authorization").unwrap(),
            "Bearer tok_123"
        );
    }

    #[test]
    fn test_basic_encodes_credentials() {
        let auth = BasicAuth::new("user", Some("pass".to_string()));
        let header = auth.auth_headers();
        let value = header.get("Authorization").unwrap();
        assert!(value.starts_with("Basic "));

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(value.strip_prefix("Basic ").unwrap())
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "user:pass");
    }

    #[test]
    fn test_basic_without_password() {
        let auth = BasicAuth::new("user", None);
        let header = auth.auth_headers();
        let value = header.get("Authorization").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(value.strip_prefix("Basic ").unwrap())
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "user:");
    }
}
