//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Compare two cursor candidates with type-aware ordering.
///
/// Values rank by type first: null < boolean < integer < number < string <
/// array < object. Within a type: booleans false < true, numerics
/// numerically, strings lexicographically, arrays and objects by their
/// serialized form (serde_json sorts object keys, so equal content always
/// serializes identically).
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank_a = type_rank(a);
    let rank_b = type_rank(b);
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                2
            } else {
                3
            }
        }
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Complete state for a connector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// Per-stream state
    #[serde(default)]
    pub streams: HashMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.streams.entry(stream.to_string()).or_default()
    }
}

/// State for a single stream: cursor-field name to the furthest-advanced
/// value observed, plus per-partition entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamState {
    /// Furthest-advanced cursor values, keyed by cursor field
    #[serde(default)]
    pub cursors: HashMap<String, Value>,

    /// Per-partition state (for partitioned streams)
    #[serde(default)]
    pub partitions: HashMap<String, PartitionState>,
}

impl StreamState {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the stored cursor value for a field
    pub fn cursor(&self, field: &str) -> Option<&Value> {
        self.cursors.get(field)
    }

    /// Offer a candidate cursor value; stores it only when further along.
    ///
    /// Returns whether the state advanced.
    pub fn advance(&mut self, field: &str, candidate: Value) -> bool {
        match self.cursors.get(field) {
            Some(current) if compare_values(&candidate, current) != Ordering::Greater => false,
            _ => {
                self.cursors.insert(field.to_string(), candidate);
                true
            }
        }
    }

    /// Get partition state
    pub fn get_partition(&self, partition_id: &str) -> Option<&PartitionState> {
        self.partitions.get(partition_id)
    }

    /// Get mutable partition state, creating if needed
    pub fn get_partition_mut(&mut self, partition_id: &str) -> &mut PartitionState {
        self.partitions.entry(partition_id.to_string()).or_default()
    }

    /// Check if a partition is completed
    pub fn is_partition_completed(&self, partition_id: &str) -> bool {
        self.partitions
            .get(partition_id)
            .is_some_and(|p| p.completed)
    }

    /// Mark a partition as completed
    pub fn mark_partition_completed(&mut self, partition_id: &str) {
        self.get_partition_mut(partition_id).completed = true;
    }

    /// Render for the interpolation context: cursor fields as top-level keys
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (field, value) in &self.cursors {
            map.insert(field.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// State for a single partition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionState {
    /// Furthest-advanced cursor values within this partition
    #[serde(default)]
    pub cursors: HashMap<String, Value>,

    /// Whether this partition has been fully synced
    #[serde(default)]
    pub completed: bool,
}

impl PartitionState {
    /// Create a new empty partition state
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate cursor value; stores it only when further along
    pub fn advance(&mut self, field: &str, candidate: Value) -> bool {
        match self.cursors.get(field) {
            Some(current) if compare_values(&candidate, current) != Ordering::Greater => false,
            _ => {
                self.cursors.insert(field.to_string(), candidate);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_type_ranks() {
        // null < boolean < integer < number < string < object
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(7), &json!(1.5)), Ordering::Less);
        assert_eq!(compare_values(&json!(9.9), &json!("a")), Ordering::Less);
        assert_eq!(
            compare_values(&json!("zzz"), &json!({"a": 1})),
            Ordering::Less
        );
    }

    #[test]
    fn test_compare_within_types() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2.5)), Ordering::Equal);
        assert_eq!(
            compare_values(&json!("2021-01-01"), &json!("2021-01-05")),
            Ordering::Less
        );
        assert_eq!(compare_values(&json!(false), &json!(true)), Ordering::Less);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut state = StreamState::new();
        assert!(state.advance("cursor", json!("2021-01-05")));
        // An earlier candidate leaves the stored state unchanged.
        assert!(!state.advance("cursor", json!("2021-01-01")));
        assert_eq!(state.cursor("cursor"), Some(&json!("2021-01-05")));

        assert!(state.advance("cursor", json!("2021-02-01")));
        assert_eq!(state.cursor("cursor"), Some(&json!("2021-02-01")));
    }

    #[test]
    fn test_advance_separate_fields() {
        let mut state = StreamState::new();
        state.advance("updated_at", json!("2024-01-01"));
        state.advance("id", json!(100));
        assert_eq!(state.cursor("updated_at"), Some(&json!("2024-01-01")));
        assert_eq!(state.cursor("id"), Some(&json!(100)));
    }

    #[test]
    fn test_partition_state() {
        let mut stream_state = StreamState::new();
        assert!(!stream_state.is_partition_completed("p1"));

        stream_state.mark_partition_completed("p1");
        assert!(stream_state.is_partition_completed("p1"));
        assert!(!stream_state.is_partition_completed("p2"));

        let p2 = stream_state.get_partition_mut("p2");
        assert!(p2.advance("updated_at", json!("2024-03-01")));
        assert!(!p2.advance("updated_at", json!("2024-02-01")));
    }

    #[test]
    fn test_state_serialization() {
        let mut state = State::new();
        state
            .get_stream_mut("users")
            .advance("updated_at", json!("2024-01-10"));
        state.get_stream_mut("users").mark_partition_completed("p1");

        let json_text = serde_json::to_string(&state).unwrap();
        let restored: State = serde_json::from_str(&json_text).unwrap();

        assert_eq!(
            restored.get_stream("users").unwrap().cursor("updated_at"),
            Some(&json!("2024-01-10"))
        );
        assert!(restored
            .get_stream("users")
            .unwrap()
            .is_partition_completed("p1"));
    }
}
