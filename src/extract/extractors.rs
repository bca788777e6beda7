//! Extractor implementations

use serde_json::Value;

use super::types::RecordExtractor;
use crate::error::{Error, Result};
use crate::types::HttpPage;

// ============================================================================
// Path helpers
// ============================================================================

/// Extract a value from JSON using a simple path (e.g. "data.items",
/// "records[0].id"). A leading "$." prefix is tolerated.
pub fn extract_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() {
        return Some(value.clone());
    }

    let mut current = value;
    for part in path.split('.') {
        // Handle array index like "records[0]"
        if let Some(bracket_pos) = part.find('[') {
            let key = &part[..bracket_pos];
            let idx_str = &part[bracket_pos + 1..part.len() - 1];

            if !key.is_empty() {
                current = current.get(key)?;
            }

            let idx = idx_str.parse::<usize>().ok()?;
            current = current.get(idx)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current.clone())
}

/// Extract a path value rendered as a string (numbers stringified)
pub fn extract_path_string(value: &Value, path: &str) -> Option<String> {
    match extract_path(value, path)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract with a full JSONPath expression (wildcards, recursion)
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path).map_err(|e| Error::JsonPath {
        message: format!("Invalid JSONPath: {e}"),
    })?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}

// ============================================================================
// Field path extractor
// ============================================================================

/// JSON extractor with an optional record path.
///
/// Without a path the whole body is the record set (an array yields its
/// elements, anything else yields a single record). Wildcard paths go
/// through the JSONPath engine; plain dot paths use the simple walker.
#[derive(Debug, Clone, Default)]
pub struct FieldPathExtractor {
    field_path: Option<String>,
}

impl FieldPathExtractor {
    /// Extract records from the body root
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract records found at the given path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            field_path: Some(path.into()),
        }
    }

    fn extract_records(&self, value: &Value) -> Result<Vec<Value>> {
        match &self.field_path {
            Some(path) => {
                if path.contains('*') || path.contains("..") {
                    extract_with_jsonpath(value, path)
                } else {
                    match extract_path(value, path) {
                        Some(Value::Array(arr)) => Ok(arr),
                        Some(Value::Null) | None => Ok(vec![]),
                        Some(v) => Ok(vec![v]),
                    }
                }
            }
            None => match value {
                Value::Array(arr) => Ok(arr.clone()),
                Value::Null => Ok(vec![]),
                _ => Ok(vec![value.clone()]),
            },
        }
    }
}

impl RecordExtractor for FieldPathExtractor {
    fn extract(&self, page: &HttpPage) -> Result<Vec<Value>> {
        // A non-empty body that failed JSON parsing is malformed content,
        // not an empty page.
        if page.body.is_null() && !page.text.trim().is_empty() {
            return Err(Error::decode(format!(
                "Response body is not valid JSON: {}",
                truncate(&page.text, 200)
            )));
        }
        self.extract_records(&page.body)
    }
}

// ============================================================================
// JSON Lines extractor
// ============================================================================

/// JSON Lines extractor (one JSON object per line)
#[derive(Debug, Clone, Default)]
pub struct JsonlExtractor;

impl JsonlExtractor {
    /// Create a new JSON Lines extractor
    pub fn new() -> Self {
        Self
    }
}

impl RecordExtractor for JsonlExtractor {
    fn extract(&self, page: &HttpPage) -> Result<Vec<Value>> {
        let mut records = Vec::new();

        for (line_num, line) in page.text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(line).map_err(|e| {
                Error::decode(format!("Invalid JSON at line {}: {e}", line_num + 1))
            })?;
            records.push(value);
        }

        Ok(records)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}
