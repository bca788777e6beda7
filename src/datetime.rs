//! Datetime parsing and bound clamping
//!
//! Incremental cursors and date-window slicers resolve their boundaries
//! through [`BoundedDatetime`]: a templated value with optional templated
//! min/max bounds, all evaluated lazily against the interpolation context.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};
use crate::interpolate::{self, Context};

/// Format applied when neither the component nor its embedding scope
/// declares one.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Parse a datetime string under the given format.
///
/// Zone-less and date-only renderings of the format are accepted by
/// assuming UTC (midnight for dates). Anything else is a propagated error,
/// never swallowed.
pub fn parse_with_format(raw: &str, format: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(raw, format) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, format) {
        return Ok(DateTime::from_naive_utc_and_offset(ndt, Utc));
    }
    if let Ok(nd) = NaiveDate::parse_from_str(raw, format) {
        let ndt = nd.and_hms_opt(0, 0, 0).unwrap();
        return Ok(DateTime::from_naive_utc_and_offset(ndt, Utc));
    }
    // RFC 3339 as a last resort covers the default format's most common
    // wire rendering ("Z" suffix instead of "+00:00").
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    Err(Error::datetime(format!(
        "Cannot parse '{raw}' with format '{format}'"
    )))
}

/// A templated datetime clamped between optional templated bounds.
#[derive(Debug, Clone, Default)]
pub struct BoundedDatetime {
    /// Template for the datetime value
    value: String,
    /// Optional template for the lower bound
    min: Option<String>,
    /// Optional template for the upper bound
    max: Option<String>,
    /// Explicitly-declared format, preferred over any caller fallback
    format: Option<String>,
}

impl BoundedDatetime {
    /// Create a resolver for the given value template
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            min: None,
            max: None,
            format: None,
        }
    }

    /// Set the lower bound template
    #[must_use]
    pub fn with_min(mut self, min: impl Into<String>) -> Self {
        self.min = Some(min.into());
        self
    }

    /// Set the upper bound template
    #[must_use]
    pub fn with_max(mut self, max: impl Into<String>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Declare the datetime format
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// The declared format, if any
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Resolve the value against the context, clamping to the bounds.
    ///
    /// Format precedence: the resolver's own format, then the caller's
    /// `fallback_format`, then [`DEFAULT_DATETIME_FORMAT`].
    ///
    /// A bound template that evaluates to the empty string (e.g. it
    /// references state that does not exist yet) is treated as unset.
    pub fn resolve(&self, ctx: &Context, fallback_format: Option<&str>) -> Result<DateTime<Utc>> {
        let format = self
            .format
            .as_deref()
            .or(fallback_format)
            .unwrap_or(DEFAULT_DATETIME_FORMAT);

        let raw = interpolate::eval_string(&self.value, ctx)?;
        let mut resolved = parse_with_format(&raw, format)?;

        if let Some(min) = &self.min {
            let raw_min = interpolate::eval_string(min, ctx)?;
            if !raw_min.is_empty() {
                let min_dt = parse_with_format(&raw_min, format)?;
                if min_dt > resolved {
                    resolved = min_dt;
                }
            }
        }

        if let Some(max) = &self.max {
            let raw_max = interpolate::eval_string(max, ctx)?;
            if !raw_max.is_empty() {
                let max_dt = parse_with_format(&raw_max, format)?;
                if max_dt < resolved {
                    resolved = max_dt;
                }
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_default_format() {
        let dt = parse_with_format("2024-03-01T12:30:00.000+0000", DEFAULT_DATETIME_FORMAT)
            .unwrap();
        assert_eq!(dt, utc("2024-03-01T12:30:00Z"));
    }

    #[test]
    fn test_parse_date_only() {
        let dt = parse_with_format("2024-03-01", "%Y-%m-%d").unwrap();
        assert_eq!(dt, utc("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn test_parse_failure_propagates() {
        let err = parse_with_format("not-a-date", "%Y-%m-%d").unwrap_err();
        assert!(err.to_string().contains("not-a-date"));
    }

    #[test]
    fn test_identity_without_bounds() {
        let resolver = BoundedDatetime::new("2024-06-15").with_format("%Y-%m-%d");
        let dt = resolver.resolve(&Context::new(), None).unwrap();
        assert_eq!(dt, utc("2024-06-15T00:00:00Z"));
    }

    #[test]
    fn test_min_clamps_earlier_value() {
        let resolver = BoundedDatetime::new("2024-01-01")
            .with_min("2024-06-01")
            .with_format("%Y-%m-%d");
        let dt = resolver.resolve(&Context::new(), None).unwrap();
        assert_eq!(dt, utc("2024-06-01T00:00:00Z"));
    }

    #[test]
    fn test_min_keeps_later_value() {
        let resolver = BoundedDatetime::new("2024-08-01")
            .with_min("2024-06-01")
            .with_format("%Y-%m-%d");
        let dt = resolver.resolve(&Context::new(), None).unwrap();
        assert_eq!(dt, utc("2024-08-01T00:00:00Z"));
    }

    #[test]
    fn test_max_clamps_later_value() {
        let resolver = BoundedDatetime::new("2024-12-01")
            .with_max("2024-10-01")
            .with_format("%Y-%m-%d");
        let dt = resolver.resolve(&Context::new(), None).unwrap();
        assert_eq!(dt, utc("2024-10-01T00:00:00Z"));
    }

    #[test]
    fn test_bounds_are_interpolated_lazily() {
        let mut ctx = Context::with_config(json!({"start_date": "2024-01-01"}));
        ctx.set_stream_state(json!({"updated_at": "2024-03-10"}));

        // State is further along than the configured start: state wins.
        let resolver = BoundedDatetime::new("{{ config.start_date }}")
            .with_min("{{ stream_state.updated_at }}")
            .with_format("%Y-%m-%d");
        let dt = resolver.resolve(&ctx, None).unwrap();
        assert_eq!(dt, utc("2024-03-10T00:00:00Z"));
    }

    #[test]
    fn test_empty_bound_is_ignored() {
        // No state yet: the min template renders empty and is skipped.
        let resolver = BoundedDatetime::new("2024-01-01")
            .with_min("{{ stream_state.updated_at }}")
            .with_format("%Y-%m-%d");
        let dt = resolver.resolve(&Context::new(), None).unwrap();
        assert_eq!(dt, utc("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_explicit_format_beats_fallback() {
        let resolver = BoundedDatetime::new("01/06/2024").with_format("%d/%m/%Y");
        let dt = resolver.resolve(&Context::new(), Some("%Y-%m-%d")).unwrap();
        assert_eq!(dt, utc("2024-06-01T00:00:00Z"));

        // Without its own format, the fallback applies.
        let resolver = BoundedDatetime::new("2024-06-01");
        let dt = resolver.resolve(&Context::new(), Some("%Y-%m-%d")).unwrap();
        assert_eq!(dt, utc("2024-06-01T00:00:00Z"));
    }
}
