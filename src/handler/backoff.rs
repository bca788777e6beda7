//! Backoff strategy implementations
//!
//! Strategies are pure functions of `(outcome, attempt_count)`. The handler
//! consults them in order; the first non-null duration wins, and if all
//! return null the caller falls back to its own default exponential backoff.

use std::time::Duration;

use super::types::Outcome;

/// Computes a retry delay for one failed attempt
pub trait BackoffStrategy: Send + Sync {
    /// The delay before the next attempt, or `None` to defer to the next
    /// strategy in the list
    fn backoff_time(&self, outcome: Outcome<'_>, attempt: u32) -> Option<Duration>;
}

// ============================================================================
// Constant
// ============================================================================

/// Fixed delay between attempts
#[derive(Debug, Clone)]
pub struct ConstantBackoff {
    delay: Duration,
}

impl ConstantBackoff {
    /// Create a constant backoff with the given delay
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for ConstantBackoff {
    fn backoff_time(&self, _outcome: Outcome<'_>, _attempt: u32) -> Option<Duration> {
        Some(self.delay)
    }
}

// ============================================================================
// Exponential
// ============================================================================

/// Exponentially growing delay: `initial * 2^attempt`, capped at `max`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create an exponential backoff
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(60),
        }
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn backoff_time(&self, _outcome: Outcome<'_>, attempt: u32) -> Option<Duration> {
        let factor = 2u32.saturating_pow(attempt);
        Some(std::cmp::min(self.initial.saturating_mul(factor), self.max))
    }
}

// ============================================================================
// Wait time from header
// ============================================================================

/// Reads the delay from a response header (e.g. `Retry-After`,
/// `X-RateLimit-Reset-After`). Returns `None` when there is no response or
/// the header is absent/non-numeric, deferring to the next strategy.
#[derive(Debug, Clone)]
pub struct WaitTimeFromHeader {
    header: String,
    max_wait: Option<Duration>,
}

impl WaitTimeFromHeader {
    /// Create a strategy reading the given header
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            max_wait: None,
        }
    }

    /// Cap the wait regardless of what the server asks for
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

impl BackoffStrategy for WaitTimeFromHeader {
    fn backoff_time(&self, outcome: Outcome<'_>, _attempt: u32) -> Option<Duration> {
        let Outcome::Response(page) = outcome else {
            return None;
        };
        let seconds = page.header(&self.header)?.parse::<f64>().ok()?;
        if seconds < 0.0 {
            return None;
        }
        let wait = Duration::from_secs_f64(seconds);
        match self.max_wait {
            Some(max) => Some(std::cmp::min(wait, max)),
            None => Some(wait),
        }
    }
}
