//! Incremental cursor
//!
//! Observes extracted records and feeds their cursor-field values into the
//! monotonic state advance. The sync start is the configured start clamped
//! by whatever the checkpoint already covers.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::datetime::BoundedDatetime;
use crate::error::Result;
use crate::interpolate::Context;

/// Datetime-flavored incremental cursor
#[derive(Debug, Clone)]
pub struct DatetimeCursor {
    /// Record attribute (dotted path) carrying the cursor value
    cursor_field: String,
    /// Declared datetime format for the cursor values
    format: Option<String>,
    /// Templated sync start, typically clamped by state via its min bound
    start: Option<BoundedDatetime>,
}

impl DatetimeCursor {
    /// Create a cursor over the given record field
    pub fn new(cursor_field: impl Into<String>) -> Self {
        Self {
            cursor_field: cursor_field.into(),
            format: None,
            start: None,
        }
    }

    /// Declare the cursor datetime format
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the sync start resolver
    #[must_use]
    pub fn with_start(mut self, start: BoundedDatetime) -> Self {
        self.start = Some(start);
        self
    }

    /// The cursor field name, used as the state key
    pub fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    /// The declared format, if any
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Pull the cursor value out of a record, following dotted paths
    pub fn record_value(&self, record: &Value) -> Option<Value> {
        let mut current = record;
        for part in self.cursor_field.split('.') {
            current = current.get(part)?;
        }
        match current {
            Value::Null => None,
            other => Some(other.clone()),
        }
    }

    /// Resolve the sync start against the context.
    ///
    /// Returns `None` when no start is configured (full history).
    pub fn resolved_start(&self, ctx: &Context) -> Result<Option<DateTime<Utc>>> {
        match &self.start {
            Some(start) => Ok(Some(start.resolve(ctx, self.format.as_deref())?)),
            None => Ok(None),
        }
    }
}
