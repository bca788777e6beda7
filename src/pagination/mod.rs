//! Pagination strategies
//!
//! Supports: Cursor, Offset, Page Number, Link Header, Next URL
//!
//! # Overview
//!
//! A paginator computes an opaque continuation from each page's response:
//! either a token, injected into the strategy's declared request-option
//! slot, or a replacement URL. `None` signals exhaustion. Stop conditions
//! let a strategy terminate early on empty pages, total counts, or marker
//! fields.

mod strategies;
mod types;

pub use strategies::{
    parse_link_header, CursorPaginator, LinkHeaderPaginator, NextUrlPaginator, NoPaginator,
    OffsetPaginator, PageNumberPaginator,
};
pub use types::{check_stop_condition, NextPage, PaginationState, Paginator, StopCondition, StopResult};
