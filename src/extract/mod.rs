//! Record extraction
//!
//! Pulls raw records out of one page's response. The extractor is a
//! collaborator interface: the pagination loop hands it every successful
//! page and yields whatever it returns, one record at a time.

mod extractors;
mod types;

pub use extractors::{extract_path, extract_path_string, FieldPathExtractor, JsonlExtractor};
pub use types::RecordExtractor;
