//! Classification types
//!
//! Defines the resolution produced for every request attempt and the
//! terminal default classification table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::Error;
use crate::types::HttpPage;

/// What to do about one request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    /// The attempt succeeded; process the page
    Success,
    /// Transient condition; retry with backoff
    Retry,
    /// Skip this response; pagination for the slice ends
    Ignore,
    /// Terminal failure; abort the slice
    Fail,
}

/// How a terminal failure should be attributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// The user's configuration is wrong (bad credentials, bad path)
    ConfigError,
    /// The upstream system or this engine misbehaved
    SystemError,
    /// A transient condition that exhausted its retry budget
    TransientError,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureType::ConfigError => "Configuration error",
            FailureType::SystemError => "System error",
            FailureType::TransientError => "Transient error",
        };
        f.write_str(name)
    }
}

/// The single resolution produced for one request attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResolution {
    /// The resolved action
    pub action: ResponseAction,
    /// Failure attribution, set for Retry/Fail resolutions
    pub failure_type: Option<FailureType>,
    /// Human-readable message for operators
    pub error_message: Option<String>,
    /// Server-requested wait before the next attempt (e.g. Retry-After)
    pub retry_in: Option<Duration>,
}

impl ErrorResolution {
    /// A successful attempt
    pub fn success() -> Self {
        Self {
            action: ResponseAction::Success,
            failure_type: None,
            error_message: None,
            retry_in: None,
        }
    }

    /// An ignored attempt
    pub fn ignore(message: impl Into<String>) -> Self {
        Self {
            action: ResponseAction::Ignore,
            failure_type: None,
            error_message: Some(message.into()),
            retry_in: None,
        }
    }

    /// A retryable attempt
    pub fn retry(failure_type: FailureType, message: impl Into<String>) -> Self {
        Self {
            action: ResponseAction::Retry,
            failure_type: Some(failure_type),
            error_message: Some(message.into()),
            retry_in: None,
        }
    }

    /// A terminal failure
    pub fn fail(failure_type: FailureType, message: impl Into<String>) -> Self {
        Self {
            action: ResponseAction::Fail,
            failure_type: Some(failure_type),
            error_message: Some(message.into()),
            retry_in: None,
        }
    }

    /// Attach a server-requested retry delay
    #[must_use]
    pub fn with_retry_in(mut self, delay: Duration) -> Self {
        self.retry_in = Some(delay);
        self
    }
}

/// The outcome of one request attempt: a received response, or a
/// transport-level exception that produced no response at all.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Response(&'a HttpPage),
    Exception(&'a Error),
}

impl Outcome<'_> {
    /// Status code, when a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Response(page) => Some(page.status),
            Outcome::Exception(_) => None,
        }
    }

    /// Best-effort error message for filter substring matching
    pub fn error_message(&self) -> String {
        match self {
            Outcome::Response(page) => page.error_message(),
            Outcome::Exception(err) => err.to_string(),
        }
    }
}

/// Seconds requested by a Retry-After header, if present and numeric
fn retry_after(page: &HttpPage) -> Option<Duration> {
    page.header("retry-after")
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// The terminal fallback classification, applied when no filter matched
/// and the response was not 2xx. Never skipped.
pub fn default_resolution(outcome: Outcome<'_>) -> ErrorResolution {
    match outcome {
        Outcome::Exception(err) => ErrorResolution::retry(
            FailureType::TransientError,
            format!("Request failed with transport error: {err}"),
        ),
        Outcome::Response(page) => {
            let status = page.status;
            match status {
                200..=399 => ErrorResolution::success(),
                408 | 429 => {
                    let mut resolution = ErrorResolution::retry(
                        FailureType::TransientError,
                        format!("HTTP {status}: rate limited or timed out upstream"),
                    );
                    if let Some(delay) = retry_after(page) {
                        resolution = resolution.with_retry_in(delay);
                    }
                    resolution
                }
                500..=599 => ErrorResolution::retry(
                    FailureType::TransientError,
                    format!("HTTP {status}: upstream server error"),
                ),
                400 | 401 | 403 | 404 | 422 => ErrorResolution::fail(
                    FailureType::ConfigError,
                    format!("HTTP {status}: {}", page.error_message()),
                ),
                _ => ErrorResolution::fail(
                    FailureType::SystemError,
                    format!("HTTP {status}: {}", page.error_message()),
                ),
            }
        }
    }
}
