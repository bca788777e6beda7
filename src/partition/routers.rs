//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashSet;

use super::types::{PartitionRouter, StreamSlice};
use crate::datetime::BoundedDatetime;
use crate::error::{Error, Result};
use crate::interpolate::Context;

// ============================================================================
// Single Partition Router
// ============================================================================

/// The trivial router: one slice covering the whole stream
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartitionRouter;

impl PartitionRouter for SinglePartitionRouter {
    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        Ok(vec![StreamSlice::new()])
    }
}

// ============================================================================
// List Router
// ============================================================================

/// Creates one slice per value of a static list
#[derive(Debug, Clone)]
pub struct ListPartitionRouter {
    /// List of partition values
    values: Vec<String>,
    /// Field name slices carry the value under
    partition_field: String,
}

impl ListPartitionRouter {
    /// Create a new list router
    pub fn new(values: Vec<String>, partition_field: impl Into<String>) -> Self {
        Self {
            values,
            partition_field: partition_field.into(),
        }
    }
}

impl PartitionRouter for ListPartitionRouter {
    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        Ok(self
            .values
            .iter()
            .map(|v| StreamSlice::new().with_partition_value(self.partition_field.clone(), v.clone()))
            .collect())
    }
}

// ============================================================================
// Substream Router
// ============================================================================

/// Creates one slice per parent record.
///
/// The parent stream's sync is materialized exactly once per sync and its
/// records handed to this router; re-reading the parent per child slice
/// would repeat every upstream call.
#[derive(Debug, Clone)]
pub struct SubstreamRouter {
    /// Records from the parent stream
    parent_records: Vec<Value>,
    /// Key to extract from parent records (dotted path)
    parent_key: String,
    /// Field name slices carry the key under
    partition_field: String,
}

impl SubstreamRouter {
    /// Create a new substream router over materialized parent records
    pub fn new(
        parent_records: Vec<Value>,
        parent_key: impl Into<String>,
        partition_field: impl Into<String>,
    ) -> Self {
        Self {
            parent_records,
            parent_key: parent_key.into(),
            partition_field: partition_field.into(),
        }
    }

    /// Create an empty router (for deferred parent loading)
    pub fn empty(parent_key: impl Into<String>, partition_field: impl Into<String>) -> Self {
        Self::new(Vec::new(), parent_key, partition_field)
    }

    /// Set parent records after the parent sync completed
    pub fn set_records(&mut self, records: Vec<Value>) {
        self.parent_records = records;
    }

    fn extract_key(&self, record: &Value) -> Option<String> {
        let mut current = record;
        for part in self.parent_key.split('.') {
            current = current.get(part)?;
        }
        match current {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl PartitionRouter for SubstreamRouter {
    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        let mut slices = Vec::new();
        let mut seen = HashSet::new();

        for record in &self.parent_records {
            if let Some(key_value) = self.extract_key(record) {
                // Deduplicate
                if seen.insert(key_value.clone()) {
                    slices.push(
                        StreamSlice::new()
                            .with_partition_value(self.partition_field.clone(), key_value),
                    );
                }
            }
        }

        Ok(slices)
    }
}

// ============================================================================
// Datetime Router
// ============================================================================

/// Creates one slice per datetime window between start and end
#[derive(Debug, Clone)]
pub struct DatetimeRouter {
    /// Window sequence start
    start: DateTime<Utc>,
    /// Window sequence end
    end: DateTime<Utc>,
    /// Window width
    step: Duration,
    /// Format for rendered bounds
    format: String,
    /// Slice field name for the window start
    start_field: String,
    /// Slice field name for the window end
    end_field: String,
}

impl DatetimeRouter {
    /// Create a router over already-resolved bounds
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
        format: impl Into<String>,
        start_field: impl Into<String>,
        end_field: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            step,
            format: format.into(),
            start_field: start_field.into(),
            end_field: end_field.into(),
        }
    }

    /// Resolve templated bounds against the context and build the router.
    ///
    /// Clamping the start against checkpointed state (and the end against
    /// "now") is expressed through the bounds' own min/max templates.
    pub fn from_bounds(
        start: &BoundedDatetime,
        end: &BoundedDatetime,
        step: &str,
        format: impl Into<String>,
        start_field: impl Into<String>,
        end_field: impl Into<String>,
        ctx: &Context,
    ) -> Result<Self> {
        let format = format.into();
        let start_dt = start.resolve(ctx, Some(&format))?;
        let end_dt = end.resolve(ctx, Some(&format))?;
        let step_dur = parse_duration(step)?;

        Ok(Self::new(
            start_dt,
            end_dt,
            step_dur,
            format,
            start_field,
            end_field,
        ))
    }

    fn format_datetime(&self, dt: DateTime<Utc>) -> String {
        dt.format(&self.format).to_string()
    }
}

impl PartitionRouter for DatetimeRouter {
    fn stream_slices(&self) -> Result<Vec<StreamSlice>> {
        let mut slices = Vec::new();
        let mut current = self.start;

        while current < self.end {
            let next = current + self.step;
            let window_end = if next > self.end { self.end } else { next };

            slices.push(
                StreamSlice::new()
                    .with_cursor_value(self.start_field.clone(), self.format_datetime(current))
                    .with_cursor_value(self.end_field.clone(), self.format_datetime(window_end)),
            );

            current = next;
        }

        Ok(slices)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a duration string like "1d", "2h", "30m"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    let (num_str, suffix) = if let Some(stripped) = s.strip_suffix('d') {
        (stripped, 'd')
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 'h')
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 'm')
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 's')
    } else if let Some(stripped) = s.strip_suffix('w') {
        (stripped, 'w')
    } else {
        // Assume days if no suffix
        (s, 'd')
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| Error::config(format!("Invalid duration number: {num_str}")))?;
    if num <= 0 {
        return Err(Error::config(format!("Duration must be positive: {s}")));
    }

    let duration = match suffix {
        'w' => Duration::weeks(num),
        'd' => Duration::days(num),
        'h' => Duration::hours(num),
        'm' => Duration::minutes(num),
        's' => Duration::seconds(num),
        _ => return Err(Error::config(format!("Invalid duration suffix: {suffix}"))),
    };

    Ok(duration)
}
