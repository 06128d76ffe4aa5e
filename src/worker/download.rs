use async_trait::async_trait;
use thiserror::Error;

use crate::extract::DownloadItem;
use crate::humanize::ByteSize;
use crate::ledger::JobParams;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("stream format '{0}' not available")]
    StreamNotFound(String),

    #[error("item has no downloadable stream")]
    NoStreams,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DownloadError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            DownloadError::RequestFailed(_) | DownloadError::Timeout => true,
            DownloadError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Process-wide download settings, fixed at startup
#[derive(Debug, Clone)]
pub struct DownloaderSettings {
    pub multi_thread: bool,
    pub chunk_size: ByteSize,
    pub retry_times: u32,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            multi_thread: false,
            chunk_size: ByteSize(1024 * 1024),
            retry_times: 3,
        }
    }
}

/// Everything a [`Downloader`] needs besides the item itself
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub stream_format: String,
    pub caption: bool,
    pub referrer: String,
    pub multi_thread: bool,
    pub chunk_size: ByteSize,
    pub retry_times: u32,
}

impl DownloadOptions {
    pub fn for_job(settings: &DownloaderSettings, params: &JobParams) -> Self {
        Self {
            stream_format: params.stream_format.clone(),
            caption: params.caption,
            referrer: params.referrer.clone(),
            multi_thread: settings.multi_thread,
            chunk_size: settings.chunk_size,
            retry_times: settings.retry_times,
        }
    }
}

/// Fetches one resolved item to storage
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        item: &DownloadItem,
        options: &DownloadOptions,
    ) -> Result<(), DownloadError>;
}
