use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::traits::ExtractionError;

pub type HeadersMap = BTreeMap<String, String>;

/// One concrete downloadable unit produced by extraction
#[derive(Debug, Clone, Default)]
pub struct DownloadItem {
    pub site: String,
    pub title: String,
    /// Page the item was resolved from
    pub url: String,
    /// Available encodings keyed by format id
    pub streams: BTreeMap<String, Stream>,
    /// Caption URLs keyed by language
    pub captions: BTreeMap<String, String>,
    /// Extra request headers the download needs (cookies, tokens)
    pub headers: HeadersMap,
    /// Set when this item failed to resolve while its siblings succeeded
    pub error: Option<ExtractionError>,
}

/// One encoding of an item, possibly split into several parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub quality: String,
    pub parts: Vec<String>,
    pub ext: String,
    pub size: Option<u64>,
}

impl DownloadItem {
    /// Item that could not be resolved
    pub fn failed(url: impl Into<String>, error: ExtractionError) -> Self {
        Self {
            url: url.into(),
            error: Some(error),
            ..Default::default()
        }
    }

    /// Stream for `format`, or the largest one when `format` is empty.
    pub fn select_stream(&self, format: &str) -> Option<&Stream> {
        if !format.is_empty() {
            return self.streams.get(format);
        }

        self.streams
            .values()
            .fold(None, |best: Option<&Stream>, candidate| match best {
                Some(best) if best.size.unwrap_or(0) >= candidate.size.unwrap_or(0) => Some(best),
                _ => Some(candidate),
            })
    }
}
