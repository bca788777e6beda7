//! Request option assembly
//!
//! Builds the query parameters, headers, and body for each outgoing request
//! by evaluating independently-configured interpolated mappings against the
//! full request context (state, slice, pagination token).

mod options;

pub use options::{RequestBody, RequestOptions, RequestOptionSlot, RequestOptionsProvider};

#[cfg(test)]
mod tests;
