//! Partition types and traits

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::error::Result;

/// An immutable unit of extraction work.
///
/// Carries everything the requester needs to build requests for its scope:
/// partition identifiers (parent ids, list values), the cursor window
/// (start/end bounds), and any extra fields. Ordered maps keep equality and
/// hashing content-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSlice {
    /// Partition identifiers (e.g. `{"account_id": "acct_1"}`)
    #[serde(default)]
    partition: BTreeMap<String, Value>,
    /// Cursor window bounds (e.g. `{"start": ..., "end": ...}`)
    #[serde(default)]
    cursor_window: BTreeMap<String, Value>,
    /// Additional fields attached by the router
    #[serde(default)]
    extra: BTreeMap<String, Value>,
}

impl StreamSlice {
    /// Create an empty slice (the whole stream)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a partition identifier
    #[must_use]
    pub fn with_partition_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.partition.insert(key.into(), value.into());
        self
    }

    /// Add a cursor window bound
    #[must_use]
    pub fn with_cursor_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cursor_window.insert(key.into(), value.into());
        self
    }

    /// Add an extra field
    #[must_use]
    pub fn with_extra_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look up a value across partition, cursor window, then extra fields
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.partition
            .get(key)
            .or_else(|| self.cursor_window.get(key))
            .or_else(|| self.extra.get(key))
    }

    /// The partition identifiers
    pub fn partition(&self) -> &BTreeMap<String, Value> {
        &self.partition
    }

    /// The cursor window bounds
    pub fn cursor_window(&self) -> &BTreeMap<String, Value> {
        &self.cursor_window
    }

    /// Whether this slice addresses the whole stream
    pub fn is_whole_stream(&self) -> bool {
        self.partition.is_empty() && self.cursor_window.is_empty()
    }

    /// A stable identifier for state keys and log lines.
    ///
    /// Built from the content, so equal slices always share an id.
    pub fn id(&self) -> String {
        if self.is_whole_stream() {
            return "_".to_string();
        }
        let mut parts = Vec::new();
        for (k, v) in self.partition.iter().chain(self.cursor_window.iter()) {
            parts.push(format!("{k}={}", value_fragment(v)));
        }
        parts.join("|")
    }

    /// Render the slice as one flat object for the interpolation context
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (k, v) in self
            .extra
            .iter()
            .chain(self.cursor_window.iter())
            .chain(self.partition.iter())
        {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

impl Hash for StreamSlice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // BTreeMap iteration order is deterministic, so serializing each
        // map gives a canonical content hash.
        for map in [&self.partition, &self.cursor_window, &self.extra] {
            for (k, v) in map {
                k.hash(state);
                v.to_string().hash(state);
            }
        }
    }
}

fn value_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Enumerates the slices of one sync
pub trait PartitionRouter: Send + Sync {
    /// Generate the finite slice sequence.
    ///
    /// Restartable only by calling again; not resumable mid-enumeration.
    fn stream_slices(&self) -> Result<Vec<StreamSlice>>;
}
