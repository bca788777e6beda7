//! Extraction types and traits

use serde_json::Value;

use crate::error::Result;
use crate::types::HttpPage;

/// Pulls zero or more raw records out of one page's response.
///
/// A malformed page is a propagated error, not an empty result: swallowing
/// it would risk silent data loss.
pub trait RecordExtractor: Send + Sync {
    /// Extract the records contained in the page
    fn extract(&self, page: &HttpPage) -> Result<Vec<Value>>;
}
