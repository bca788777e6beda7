//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use serde_json::Value;

use crate::extract::{extract_path, extract_path_string};
use crate::request::{RequestOptionSlot, RequestOptions};
use crate::types::HttpPage;

/// The continuation computed from one page's response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// An opaque token, injected into the paginator's declared slot
    Token(String),
    /// A full replacement URL for the next request
    Url(String),
}

impl NextPage {
    /// The token value, if this is a token continuation
    pub fn token(&self) -> Option<&str> {
        match self {
            NextPage::Token(t) => Some(t),
            NextPage::Url(_) => None,
        }
    }

    /// Render the continuation for the interpolation context
    pub fn to_value(&self) -> Value {
        match self {
            NextPage::Token(t) => serde_json::json!({ "token": t }),
            NextPage::Url(u) => serde_json::json!({ "url": u }),
        }
    }
}

/// Tracks pagination progress during one slice's iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Current page number (for page-based pagination)
    pub page: u64,
    /// Current offset (for offset-based pagination)
    pub offset: u64,
    /// Current cursor value
    pub cursor: Option<String>,
    /// Total records fetched so far
    pub total_fetched: u64,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment page number
    pub fn next_page(&mut self) {
        self.page += 1;
    }

    /// Add offset
    pub fn add_offset(&mut self, amount: u64) {
        self.offset += amount;
    }

    /// Set cursor
    pub fn set_cursor(&mut self, cursor: String) {
        self.cursor = Some(cursor);
    }

    /// Add to total fetched
    pub fn add_fetched(&mut self, count: u64) {
        self.total_fetched += count;
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Apply first-request options (page size, starting page, resumed
    /// cursor) before any token exists
    fn initial_options(&self, state: &PaginationState, options: &mut RequestOptions);

    /// Compute the continuation from a response, or `None` on exhaustion
    fn next_page(
        &self,
        page: &HttpPage,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Option<NextPage>;

    /// The request-option slot token continuations are injected into.
    /// Strategies that only produce URL continuations return `None`.
    fn token_slot(&self) -> Option<&RequestOptionSlot> {
        None
    }
}

/// Stop conditions for pagination
#[derive(Debug, Clone, Default)]
pub enum StopCondition {
    /// Stop when page is empty (no records)
    #[default]
    EmptyPage,

    /// Stop when a field has a specific value
    Field {
        /// Path to the field
        path: String,
        /// Expected value to stop
        value: Value,
    },

    /// Stop when offset reaches total count
    TotalCount {
        /// Path to total count field
        path: String,
    },

    /// Stop when page number reaches total pages
    TotalPages {
        /// Path to total pages field
        path: String,
    },
}

impl StopCondition {
    /// Create a field-based stop condition
    pub fn field(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Create a total count stop condition
    pub fn total_count(path: impl Into<String>) -> Self {
        Self::TotalCount { path: path.into() }
    }

    /// Create a total pages stop condition
    pub fn total_pages(path: impl Into<String>) -> Self {
        Self::TotalPages { path: path.into() }
    }
}

/// Result of checking a stop condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    /// Continue pagination
    Continue,
    /// Stop pagination
    Stop,
}

/// Check a stop condition against a response
pub fn check_stop_condition(
    condition: &StopCondition,
    body: &Value,
    records_count: usize,
    state: &PaginationState,
) -> StopResult {
    match condition {
        StopCondition::EmptyPage => {
            if records_count == 0 {
                StopResult::Stop
            } else {
                StopResult::Continue
            }
        }
        StopCondition::Field { path, value } => {
            if extract_path(body, path).as_ref() == Some(value) {
                StopResult::Stop
            } else {
                StopResult::Continue
            }
        }
        StopCondition::TotalCount { path } => {
            if let Some(total) =
                extract_path_string(body, path).and_then(|s| s.parse::<u64>().ok())
            {
                if state.total_fetched >= total {
                    StopResult::Stop
                } else {
                    StopResult::Continue
                }
            } else {
                StopResult::Continue
            }
        }
        StopCondition::TotalPages { path } => {
            if let Some(total_pages) =
                extract_path_string(body, path).and_then(|s| s.parse::<u64>().ok())
            {
                if state.page + 1 >= total_pages {
                    StopResult::Stop
                } else {
                    StopResult::Continue
                }
            } else {
                StopResult::Continue
            }
        }
    }
}
