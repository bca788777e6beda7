//! Common types used throughout the Rill CDK
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::partition::StreamSlice;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

// ============================================================================
// HTTP Page
// ============================================================================

/// One fully-received HTTP response page.
///
/// The transport reads the whole response up front so the classifier,
/// extractor, and paginator can all inspect it without re-reading the wire.
/// The body is parsed leniently: anything that is not valid JSON (including
/// an empty body) parses to `Value::Null`.
#[derive(Debug, Clone)]
pub struct HttpPage {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw response body text
    pub text: String,
    /// Response body parsed as JSON (`Null` when empty or not JSON)
    pub body: Value,
}

impl HttpPage {
    /// Create a page from status, headers and raw body text
    pub fn new(status: u16, headers: HeaderMap, text: String) -> Self {
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            headers,
            text,
            body,
        }
    }

    /// Create a page with a JSON body (test convenience)
    pub fn from_json(status: u16, body: Value) -> Self {
        let text = body.to_string();
        Self {
            status,
            headers: HeaderMap::new(),
            text,
            body,
        }
    }

    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the response carries no body at all.
    ///
    /// Some APIs omit the final empty page entirely; pagination treats this
    /// as exhaustion, not an error. A non-empty body that fails to parse is
    /// NOT empty; the extractor reports it as malformed content.
    pub fn is_empty_body(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Headers rendered as a JSON object, for predicate evaluation
    pub fn headers_as_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.headers {
            if let Ok(v) = value.to_str() {
                map.insert(name.as_str().to_string(), Value::String(v.to_string()));
            }
        }
        Value::Object(map)
    }

    /// Best-effort human-readable error message from the body.
    ///
    /// Checks the message fields APIs commonly use. Falls back to the raw
    /// body text when none is present.
    pub fn error_message(&self) -> String {
        for key in ["message", "error", "error_message", "detail", "errors"] {
            if let Some(v) = self.body.get(key) {
                match v {
                    Value::String(s) => return s.clone(),
                    Value::Null => {}
                    other => return other.to_string(),
                }
            }
        }
        self.text.clone()
    }
}

// ============================================================================
// Record
// ============================================================================

/// One extracted output row, tagged with its originating scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The record payload
    pub data: Value,
    /// Name of the stream the record belongs to
    pub stream: String,
    /// The slice this record was extracted under
    pub slice: StreamSlice,
}

impl Record {
    /// Create a new record
    pub fn new(data: Value, stream: impl Into<String>, slice: StreamSlice) -> Self {
        Self {
            data,
            stream: stream.into(),
            slice,
        }
    }

    /// Get a field by dotted path (e.g. "data.updated_at")
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.data;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_conversion() {
        let get: reqwest::Method = Method::GET.into();
        assert_eq!(reqwest::Method::GET, get);
        let post: reqwest::Method = Method::POST.into();
        assert_eq!(reqwest::Method::POST, post);
    }

    #[test]
    fn test_method_default() {
        assert_eq!(Method::default(), Method::GET);
    }

    #[test]
    fn test_http_page_lenient_body() {
        let page = HttpPage::new(200, HeaderMap::new(), "not json".to_string());
        assert!(page.body.is_null());
        assert!(!page.is_empty_body());

        let page = HttpPage::new(200, HeaderMap::new(), String::new());
        assert!(page.is_empty_body());

        let page = HttpPage::from_json(200, json!({"data": []}));
        assert!(!page.is_empty_body());
        assert!(page.is_success());
    }

    #[test]
    fn test_http_page_error_message() {
        let page = HttpPage::from_json(403, json!({"message": "forbidden resource"}));
        assert_eq!(page.error_message(), "forbidden resource");

        let page = HttpPage::from_json(500, json!({"error": "internal"}));
        assert_eq!(page.error_message(), "internal");

        let page = HttpPage::new(500, HeaderMap::new(), "plain text failure".to_string());
        assert_eq!(page.error_message(), "plain text failure");
    }

    #[test]
    fn test_record_field_path() {
        let record = Record::new(
            json!({"id": 1, "meta": {"updated_at": "2024-01-01"}}),
            "users",
            StreamSlice::new(),
        );
        assert_eq!(record.field("id"), Some(&json!(1)));
        assert_eq!(record.field("meta.updated_at"), Some(&json!("2024-01-01")));
        assert_eq!(record.field("missing.path"), None);
    }

    #[test]
    fn test_option_string_none_if_empty() {
        assert_eq!(
            Some("test".to_string()).none_if_empty(),
            Some("test".to_string())
        );
        assert_eq!(Some(String::new()).none_if_empty(), None);
        assert_eq!(None::<String>.none_if_empty(), None);
    }
}
