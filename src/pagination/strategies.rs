//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{
    check_stop_condition, NextPage, PaginationState, Paginator, StopCondition, StopResult,
};
use crate::extract::extract_path_string;
use crate::request::{RequestOptionSlot, RequestOptions};
use crate::types::HttpPage;

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor-based pagination (e.g., Stripe, Slack)
///
/// Extracts a cursor value from each response and injects it into the
/// declared slot on the next request. Common patterns:
/// - `?starting_after=obj_123`
/// - `?cursor=abc123`
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Where the cursor token is injected
    slot: RequestOptionSlot,
    /// Path to extract the cursor from the response
    cursor_path: String,
    /// Stop condition checked before extracting the cursor
    stop_condition: StopCondition,
}

impl CursorPaginator {
    /// Create a cursor paginator injecting into a query parameter
    pub fn new(cursor_param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self {
            slot: RequestOptionSlot::QueryParam(cursor_param.into()),
            cursor_path: cursor_path.into(),
            stop_condition: StopCondition::EmptyPage,
        }
    }

    /// Create a cursor paginator injecting into an arbitrary slot
    pub fn with_slot(slot: RequestOptionSlot, cursor_path: impl Into<String>) -> Self {
        Self {
            slot,
            cursor_path: cursor_path.into(),
            stop_condition: StopCondition::EmptyPage,
        }
    }

    /// Set the stop condition
    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop_condition = condition;
        self
    }
}

impl Paginator for CursorPaginator {
    fn initial_options(&self, state: &PaginationState, options: &mut RequestOptions) {
        // A resumed cursor (if the caller seeded one) goes straight into
        // the slot on the first request.
        if let Some(cursor) = &state.cursor {
            self.slot.apply(cursor, options);
        }
    }

    fn next_page(
        &self,
        page: &HttpPage,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Option<NextPage> {
        state.add_fetched(records_count as u64);

        if check_stop_condition(&self.stop_condition, &page.body, records_count, state)
            == StopResult::Stop
        {
            return None;
        }

        let cursor = extract_path_string(&page.body, &self.cursor_path)?;
        if cursor.is_empty() {
            return None;
        }
        state.set_cursor(cursor.clone());
        Some(NextPage::Token(cursor))
    }

    fn token_slot(&self) -> Option<&RequestOptionSlot> {
        Some(&self.slot)
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination (SQL-style)
///
/// Common patterns:
/// - `?offset=100&limit=50`
/// - `?skip=100&take=50`
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Where the offset token is injected
    slot: RequestOptionSlot,
    /// Query parameter name for the page size
    limit_param: String,
    /// Records per page
    limit: u64,
    /// Stop condition
    stop_condition: StopCondition,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(offset_param: impl Into<String>, limit_param: impl Into<String>, limit: u64) -> Self {
        Self {
            slot: RequestOptionSlot::QueryParam(offset_param.into()),
            limit_param: limit_param.into(),
            limit,
            stop_condition: StopCondition::EmptyPage,
        }
    }

    /// Set the stop condition
    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop_condition = condition;
        self
    }
}

impl Paginator for OffsetPaginator {
    fn initial_options(&self, state: &PaginationState, options: &mut RequestOptions) {
        self.slot.apply(&state.offset.to_string(), options);
        options.set_param(self.limit_param.clone(), self.limit.to_string());
    }

    fn next_page(
        &self,
        page: &HttpPage,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Option<NextPage> {
        state.add_fetched(records_count as u64);

        if check_stop_condition(&self.stop_condition, &page.body, records_count, state)
            == StopResult::Stop
        {
            return None;
        }

        // A short page means the server ran out of records.
        if (records_count as u64) < self.limit {
            return None;
        }

        state.add_offset(self.limit);
        Some(NextPage::Token(state.offset.to_string()))
    }

    fn token_slot(&self) -> Option<&RequestOptionSlot> {
        Some(&self.slot)
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination (traditional web pagination)
///
/// Common patterns:
/// - `?page=2`
/// - `?page=2&per_page=50`
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    /// Where the page-number token is injected
    slot: RequestOptionSlot,
    /// First page number (usually 0 or 1)
    start_page: u64,
    /// Optional page size parameter name
    page_size_param: Option<String>,
    /// Page size value
    page_size: Option<u64>,
    /// Stop condition
    stop_condition: StopCondition,
}

impl PageNumberPaginator {
    /// Create a new page number paginator
    pub fn new(page_param: impl Into<String>, start_page: u64) -> Self {
        Self {
            slot: RequestOptionSlot::QueryParam(page_param.into()),
            start_page,
            page_size_param: None,
            page_size: None,
            stop_condition: StopCondition::EmptyPage,
        }
    }

    /// Set page size parameter
    #[must_use]
    pub fn with_page_size(mut self, param: impl Into<String>, size: u64) -> Self {
        self.page_size_param = Some(param.into());
        self.page_size = Some(size);
        self
    }

    /// Set stop condition
    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop_condition = condition;
        self
    }

    fn apply_page_size(&self, options: &mut RequestOptions) {
        if let (Some(param), Some(size)) = (&self.page_size_param, self.page_size) {
            options.set_param(param.clone(), size.to_string());
        }
    }
}

impl Paginator for PageNumberPaginator {
    fn initial_options(&self, state: &PaginationState, options: &mut RequestOptions) {
        self.slot
            .apply(&(self.start_page + state.page).to_string(), options);
        self.apply_page_size(options);
    }

    fn next_page(
        &self,
        page: &HttpPage,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Option<NextPage> {
        state.add_fetched(records_count as u64);

        if check_stop_condition(&self.stop_condition, &page.body, records_count, state)
            == StopResult::Stop
        {
            return None;
        }

        // A short page means the server ran out of records.
        if let Some(size) = self.page_size {
            if (records_count as u64) < size {
                return None;
            }
        }

        state.next_page();
        Some(NextPage::Token((self.start_page + state.page).to_string()))
    }

    fn token_slot(&self) -> Option<&RequestOptionSlot> {
        Some(&self.slot)
    }
}

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Link header pagination (RFC 5988)
///
/// Extracts the next page URL from the Link header.
/// Common in GitHub, GitLab APIs.
/// Format: `Link: <https://api.github.com/...?page=2>; rel="next", ...`
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    /// Rel value to follow (default: "next")
    rel: String,
}

impl Default for LinkHeaderPaginator {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
        }
    }
}

impl LinkHeaderPaginator {
    /// Create a new link header paginator
    pub fn new(rel: impl Into<String>) -> Self {
        Self { rel: rel.into() }
    }
}

impl Paginator for LinkHeaderPaginator {
    fn initial_options(&self, _state: &PaginationState, _options: &mut RequestOptions) {}

    fn next_page(
        &self,
        page: &HttpPage,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Option<NextPage> {
        state.add_fetched(records_count as u64);

        let link_header = page.header("link")?;
        let next_url = parse_link_header(link_header, &self.rel)?;
        state.next_page();
        Some(NextPage::Url(next_url))
    }
}

/// Parse a Link header and extract the URL for the given rel
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // Link header format: <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let part = part.trim();
        let mut url = None;
        let mut rel = None;

        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                let rel_value = stripped.trim_matches('"').trim_matches('\'');
                rel = Some(rel_value);
            }
        }

        if let (Some(u), Some(r)) = (url, rel) {
            if r == target_rel {
                return Some(u.to_string());
            }
        }
    }

    None
}

// ============================================================================
// Next URL Pagination
// ============================================================================

/// Next URL pagination (URL in response body)
///
/// Common patterns:
/// - `{ "next": "https://api.example.com/items?page=2" }`
/// - `{ "pagination": { "next_url": "..." } }`
#[derive(Debug, Clone)]
pub struct NextUrlPaginator {
    /// Path to extract the next URL from the response
    path: String,
}

impl NextUrlPaginator {
    /// Create a new next URL paginator
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Paginator for NextUrlPaginator {
    fn initial_options(&self, _state: &PaginationState, _options: &mut RequestOptions) {}

    fn next_page(
        &self,
        page: &HttpPage,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Option<NextPage> {
        state.add_fetched(records_count as u64);

        let next_url = extract_path_string(&page.body, &self.path)?;
        if next_url.is_empty() {
            return None;
        }
        state.next_page();
        Some(NextPage::Url(next_url))
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn initial_options(&self, _state: &PaginationState, _options: &mut RequestOptions) {}

    fn next_page(
        &self,
        _page: &HttpPage,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Option<NextPage> {
        state.add_fetched(records_count as u64);
        None
    }
}
