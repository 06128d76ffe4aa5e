use async_trait::async_trait;
use thiserror::Error;

use super::types::DownloadItem;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported url: {0}")]
    Unsupported(String),
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Options forwarded from the job to the extractor.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub cookie: String,
}

/// Resolves a URL into items.
///
/// An `Err` means nothing could be resolved. Partial results are returned as
/// `Ok` with [`DownloadItem::error`] set on the items that failed.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<Vec<DownloadItem>, ExtractionError>;
}
