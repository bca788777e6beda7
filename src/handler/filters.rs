//! User-declared response filters
//!
//! A filter maps a response shape to an action before the default table is
//! consulted. Filters match by status-code membership, by an interpolated
//! predicate over the parsed body and headers, or by substring membership
//! in the parsed error message.

use serde_json::Value;
use std::collections::HashSet;

use super::types::{ErrorResolution, FailureType, Outcome, ResponseAction};
use crate::interpolate::{self, Context};

/// One user-declared classification rule
#[derive(Debug, Clone)]
pub struct ResponseFilter {
    /// Action to take when this filter matches
    action: ResponseAction,
    /// Failure attribution override
    failure_type: Option<FailureType>,
    /// Status codes this filter applies to
    http_codes: HashSet<u16>,
    /// Boolean template evaluated against `response` / `headers`
    predicate: Option<String>,
    /// Substring looked up in the parsed error message
    error_message_contains: Option<String>,
    /// Template for the operator-facing message
    error_message: Option<String>,
}

impl ResponseFilter {
    /// Create a filter for the given action
    pub fn new(action: ResponseAction) -> Self {
        Self {
            action,
            failure_type: None,
            http_codes: HashSet::new(),
            predicate: None,
            error_message_contains: None,
            error_message: None,
        }
    }

    /// Match by status-code membership
    #[must_use]
    pub fn with_http_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.http_codes.extend(codes);
        self
    }

    /// Match by a predicate template, e.g. `{{ response.errors }}` or
    /// `{{ headers['x-ratelimit-remaining'] == '0' }}`
    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Match by substring in the parsed error message
    #[must_use]
    pub fn with_error_message_contains(mut self, needle: impl Into<String>) -> Self {
        self.error_message_contains = Some(needle.into());
        self
    }

    /// Set the operator-facing message template
    #[must_use]
    pub fn with_error_message(mut self, template: impl Into<String>) -> Self {
        self.error_message = Some(template.into());
        self
    }

    /// Override the failure attribution
    #[must_use]
    pub fn with_failure_type(mut self, failure_type: FailureType) -> Self {
        self.failure_type = Some(failure_type);
        self
    }

    /// The action this filter resolves to
    pub fn action(&self) -> ResponseAction {
        self.action
    }

    /// Whether this filter matches the outcome.
    ///
    /// Any one configured criterion is sufficient; a filter with no
    /// criteria never matches.
    pub fn matches(&self, outcome: Outcome<'_>, config: &Value) -> bool {
        if let Some(status) = outcome.status() {
            if self.http_codes.contains(&status) {
                return true;
            }
        }

        if let Some(predicate) = &self.predicate {
            let ctx = self.response_context(outcome, config);
            if interpolate::eval_bool(predicate, &ctx).unwrap_or(false) {
                return true;
            }
        }

        if let Some(needle) = &self.error_message_contains {
            if outcome.error_message().contains(needle.as_str()) {
                return true;
            }
        }

        false
    }

    /// Produce this filter's resolution, interpolating the message template
    pub fn resolution_for(&self, outcome: Outcome<'_>, config: &Value) -> ErrorResolution {
        let message = self.error_message.as_ref().map_or_else(
            || {
                format!(
                    "Response matched a configured {:?} filter: {}",
                    self.action,
                    outcome.error_message()
                )
            },
            |template| {
                let ctx = self.response_context(outcome, config);
                interpolate::eval_string(template, &ctx)
                    .unwrap_or_else(|_| template.clone())
            },
        );

        let failure_type = self.failure_type.or(match self.action {
            ResponseAction::Retry => Some(FailureType::TransientError),
            ResponseAction::Fail => Some(FailureType::SystemError),
            _ => None,
        });

        ErrorResolution {
            action: self.action,
            failure_type,
            error_message: Some(message),
            retry_in: None,
        }
    }

    fn response_context(&self, outcome: Outcome<'_>, config: &Value) -> Context {
        let mut ctx = Context::with_config(config.clone());
        if let Outcome::Response(page) = outcome {
            ctx.set_response(page.body.clone());
            ctx.set_headers(page.headers_as_value());
            ctx.set_extra("status_code", Value::from(page.status));
        }
        ctx
    }
}
