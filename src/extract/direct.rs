use async_trait::async_trait;
use reqwest::Url;
use std::collections::BTreeMap;

use super::traits::{ExtractOptions, ExtractionError, Extractor};
use super::types::{DownloadItem, HeadersMap, Stream};

const DEFAULT_STREAM: &str = "default";
const FALLBACK_TITLE: &str = "download";

/// Extractor for URLs that already point at a file.
///
/// Produces a single item with one stream whose only part is the URL itself.
#[derive(Debug, Clone, Default)]
pub struct DirectExtractor;

impl DirectExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for DirectExtractor {
    async fn extract(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<Vec<DownloadItem>, ExtractionError> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| ExtractionError::InvalidUrl(format!("{url}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExtractionError::Unsupported(url.to_string()));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ExtractionError::InvalidUrl(format!("{url}: missing host")))?
            .to_string();

        let file_name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or(FALLBACK_TITLE);

        let (title, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
                (stem.to_string(), ext.to_ascii_lowercase())
            }
            _ => (file_name.to_string(), String::new()),
        };

        let mut headers = HeadersMap::new();
        if !options.cookie.is_empty() {
            headers.insert("Cookie".to_string(), options.cookie.clone());
        }

        let mut streams = BTreeMap::new();
        streams.insert(
            DEFAULT_STREAM.to_string(),
            Stream {
                id: DEFAULT_STREAM.to_string(),
                quality: String::new(),
                parts: vec![parsed.to_string()],
                ext,
                size: None,
            },
        );

        Ok(vec![DownloadItem {
            site: host,
            title,
            url: parsed.to_string(),
            streams,
            captions: BTreeMap::new(),
            headers,
            error: None,
        }])
    }
}
