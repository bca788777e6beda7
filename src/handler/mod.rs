//! Response classification and backoff policy
//!
//! Every request attempt resolves to exactly one [`ErrorResolution`]:
//! user-declared [`ResponseFilter`]s are consulted in order (first match
//! wins), an unmatched 2xx resolves to success, and a hard-coded default
//! table is the terminal fallback. Backoff durations come from an ordered
//! list of [`BackoffStrategy`] values; the first non-null duration wins.

mod backoff;
mod filters;
mod types;

pub use backoff::{BackoffStrategy, ConstantBackoff, ExponentialBackoff, WaitTimeFromHeader};
pub use filters::ResponseFilter;
pub use types::{default_resolution, ErrorResolution, FailureType, Outcome, ResponseAction};

use serde_json::Value;
use std::time::Duration;

/// Classifies request outcomes and computes retry backoff.
///
/// Layering user-declared filters over a conservative default table means a
/// connector only declares the cases it needs to override.
#[derive(Default)]
pub struct DefaultErrorHandler {
    filters: Vec<ResponseFilter>,
    backoff_strategies: Vec<Box<dyn BackoffStrategy>>,
}

impl DefaultErrorHandler {
    /// Create a handler with no filters and no backoff strategies
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response filter (filters match in insertion order)
    #[must_use]
    pub fn with_filter(mut self, filter: ResponseFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append a backoff strategy (strategies are consulted in insertion order)
    #[must_use]
    pub fn with_backoff(mut self, strategy: Box<dyn BackoffStrategy>) -> Self {
        self.backoff_strategies.push(strategy);
        self
    }

    /// Resolve one request attempt to an action.
    ///
    /// `config` is available to filter predicates and error-message
    /// templates.
    pub fn interpret(&self, outcome: Outcome<'_>, config: &Value) -> ErrorResolution {
        for filter in &self.filters {
            if filter.matches(outcome, config) {
                return filter.resolution_for(outcome, config);
            }
        }

        if let Outcome::Response(page) = outcome {
            if page.is_success() {
                return ErrorResolution::success();
            }
        }

        default_resolution(outcome)
    }

    /// Compute a backoff duration for a retryable attempt.
    ///
    /// Returns `None` when no strategy produced a duration; the caller then
    /// applies its own default backoff.
    pub fn backoff_time(&self, outcome: Outcome<'_>, attempt: u32) -> Option<Duration> {
        self.backoff_strategies
            .iter()
            .find_map(|strategy| strategy.backoff_time(outcome, attempt))
    }
}

impl std::fmt::Debug for DefaultErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultErrorHandler")
            .field("filters", &self.filters)
            .field("backoff_strategies", &self.backoff_strategies.len())
            .finish()
    }
}
