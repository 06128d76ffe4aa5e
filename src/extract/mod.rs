//! Extraction collaborator: resolve a source URL into downloadable items.
//!
//! Site-specific resolution lives behind the [`Extractor`] trait. The crate
//! ships [`DirectExtractor`], which treats the URL itself as the only item.

mod direct;
mod traits;
mod types;

pub use direct::DirectExtractor;
pub use traits::{ExtractOptions, ExtractionError, Extractor};
pub use types::{DownloadItem, HeadersMap, Stream};
