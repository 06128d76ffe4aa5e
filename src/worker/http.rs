//! HTTP downloader backed by reqwest

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use reqwest::Response;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::download::{DownloadError, DownloadOptions, Downloader};
use crate::extract::DownloadItem;
use crate::storage::{StorageClient, StorageWriter};

pub type Result<T> = std::result::Result<T, DownloadError>;

type Headers = Arc<Vec<(String, String)>>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Delay before the first retry; doubles on each further attempt
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(1),
            user_agent: concat!("grabd/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Body chunks a concurrently fetched part may hold while earlier parts drain
const PART_BUFFER_CHUNKS: usize = 8;

/// Downloads every part of the selected stream into storage
pub struct HttpDownloader {
    client: Client,
    storage: StorageClient,
    retry_backoff: Duration,
}

impl HttpDownloader {
    pub fn new(config: HttpConfig, storage: StorageClient) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DownloadError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            storage,
            retry_backoff: config.retry_backoff,
        })
    }

    fn fetcher(&self, headers: Headers, retry_times: u32) -> Fetcher {
        Fetcher {
            client: self.client.clone(),
            headers,
            attempts: retry_times.saturating_add(1),
            backoff: self.retry_backoff,
        }
    }

    /// Stream every part into `writer` in order.
    ///
    /// With `concurrent`, all parts are requested at once and each one fills
    /// a small bounded buffer; parts are drained strictly by index, so at
    /// most `PART_BUFFER_CHUNKS` chunks per part wait in memory.
    async fn copy_parts(
        &self,
        parts: &[String],
        fetcher: &Fetcher,
        concurrent: bool,
        writer: &mut StorageWriter,
    ) -> Result<()> {
        if !concurrent || parts.len() < 2 {
            for url in parts {
                let mut response = fetcher.open(url).await?;
                while let Some(chunk) = next_chunk(url, &mut response).await? {
                    writer.write(&chunk).await?;
                }
            }
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        let mut receivers = Vec::with_capacity(parts.len());
        for url in parts.iter().cloned() {
            let (tx, rx) = mpsc::channel(PART_BUFFER_CHUNKS);
            let fetcher = fetcher.clone();
            tasks.spawn(async move { fetcher.pump(&url, tx).await });
            receivers.push(rx);
        }

        // Returning early drops the JoinSet, which aborts the remaining parts
        for mut rx in receivers {
            while let Some(chunk) = rx.recv().await {
                writer.write(&chunk?).await?;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| DownloadError::RequestFailed(format!("part task failed: {e}")))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, item: &DownloadItem, options: &DownloadOptions) -> Result<()> {
        let stream = item.select_stream(&options.stream_format).ok_or_else(|| {
            if options.stream_format.is_empty() {
                DownloadError::NoStreams
            } else {
                DownloadError::StreamNotFound(options.stream_format.clone())
            }
        })?;
        if stream.parts.is_empty() {
            return Err(DownloadError::NoStreams);
        }

        let mut headers: Vec<(String, String)> = item
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if !options.referrer.is_empty() {
            headers.push(("Referer".to_string(), options.referrer.clone()));
        }
        let fetcher = self.fetcher(Arc::new(headers), options.retry_times);

        let key = file_name(&item.title, &stream.ext);
        debug!(
            key,
            stream = %stream.id,
            parts = stream.parts.len(),
            multi_thread = options.multi_thread,
            "Downloading item"
        );

        let chunk_size = options.chunk_size.as_usize();
        let mut writer = self.storage.writer(&key, chunk_size).await?;
        if let Err(e) = self
            .copy_parts(&stream.parts, &fetcher, options.multi_thread, &mut writer)
            .await
        {
            if let Err(abort_err) = writer.abort().await {
                warn!(key, error = %abort_err, "Failed to abort partial upload");
            }
            return Err(e);
        }
        writer.finish().await?;

        if options.caption {
            for (lang, url) in &item.captions {
                let body = fetcher.fetch_all(url).await?;
                let caption_key = file_name(&format!("{}.{}", item.title, lang), "srt");
                self.storage.upload(&caption_key, body.to_vec()).await?;
            }
        }

        Ok(())
    }
}

/// One request with retry policy applied; cheap to clone into part tasks
#[derive(Clone)]
struct Fetcher {
    client: Client,
    headers: Headers,
    attempts: u32,
    backoff: Duration,
}

impl Fetcher {
    /// Send the request, retrying transient failures until a response with
    /// a success status arrives. The body is left unread.
    async fn open(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.open_once(url).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(url, attempt, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!(url, attempt, error = %e, "Request failed, retrying");
                    let backoff = self
                        .backoff
                        .saturating_mul(2u32.saturating_pow(attempt - 1))
                        .min(MAX_BACKOFF);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "Request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn open_once(&self, url: &str) -> Result<Response> {
        let mut request = self.client.get(url);
        for (name, value) in self.headers.iter() {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::Timeout
            } else if e.is_redirect() {
                DownloadError::TooManyRedirects
            } else {
                DownloadError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    /// Whole body of a small resource such as a caption file
    async fn fetch_all(&self, url: &str) -> Result<Bytes> {
        self.open(url)
            .await?
            .bytes()
            .await
            .map_err(|e| DownloadError::RequestFailed(format!("Failed to read body: {}", e)))
    }

    /// Forward the body of `url` chunk by chunk; a failure is sent as the last item.
    ///
    /// Stops quietly when the receiver is gone.
    async fn pump(&self, url: &str, tx: mpsc::Sender<Result<Bytes>>) {
        let streamed = async {
            let mut response = self.open(url).await?;
            while let Some(chunk) = next_chunk(url, &mut response).await? {
                if tx.send(Ok(chunk)).await.is_err() {
                    break;
                }
            }
            Ok::<(), DownloadError>(())
        };

        if let Err(e) = streamed.await {
            let _ = tx.send(Err(e)).await;
        }
    }
}

/// Next body chunk; a read error mid-body is not retried since earlier
/// chunks are already written
async fn next_chunk(url: &str, response: &mut Response) -> Result<Option<Bytes>> {
    let chunk = response
        .chunk()
        .await
        .map_err(|e| DownloadError::RequestFailed(format!("Failed to read body of {url}: {e}")))?;

    if let Some(bytes) = &chunk {
        debug!(url, size = bytes.len(), "Chunk received");
    }

    Ok(chunk)
}

/// Storage key for a title, with characters that are unsafe in file names replaced
pub fn file_name(title: &str, ext: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');
    let stem = if cleaned.is_empty() { "download" } else { cleaned };

    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Stream;
    use crate::humanize::ByteSize;
    use axum::{Router, http::HeaderMap, http::StatusCode, routing::get};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    async fn start_server() -> (String, Arc<AtomicUsize>) {
        let flaky_hits = Arc::new(AtomicUsize::new(0));
        let hits = flaky_hits.clone();

        let app = Router::new()
            .route("/part1", get(|| async { "hello " }))
            .route("/part2", get(|| async { "world" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/needs-referer",
                get(|headers: HeaderMap| async move {
                    match headers.get("referer").and_then(|v| v.to_str().ok()) {
                        Some("https://example.com/page") => (StatusCode::OK, "ok"),
                        _ => (StatusCode::FORBIDDEN, "no"),
                    }
                }),
            )
            .route(
                "/flaky",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                            (StatusCode::SERVICE_UNAVAILABLE, "busy")
                        } else {
                            (StatusCode::OK, "finally")
                        }
                    }
                }),
            )
            .route("/en.srt", get(|| async { "1\n00:00:01 --> 00:00:02\nhi\n" }))
            .route("/large", get(|| async { large_body() }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), flaky_hits)
    }

    const LARGE_LEN: usize = 4 * 1024 * 1024;

    fn large_body() -> Vec<u8> {
        (0..LARGE_LEN).map(|i| (i % 251) as u8).collect()
    }

    fn downloader(storage: StorageClient) -> HttpDownloader {
        let config = HttpConfig {
            retry_backoff: Duration::from_millis(5),
            ..Default::default()
        };
        HttpDownloader::new(config, storage).unwrap()
    }

    fn item(title: &str, parts: Vec<String>) -> DownloadItem {
        let mut streams = BTreeMap::new();
        streams.insert(
            "default".to_string(),
            Stream {
                id: "default".to_string(),
                parts,
                ext: "txt".to_string(),
                ..Default::default()
            },
        );
        DownloadItem {
            title: title.to_string(),
            streams,
            ..Default::default()
        }
    }

    fn options() -> DownloadOptions {
        DownloadOptions {
            stream_format: String::new(),
            caption: false,
            referrer: String::new(),
            multi_thread: false,
            chunk_size: ByteSize(4),
            retry_times: 3,
        }
    }

    #[tokio::test]
    async fn test_parts_are_joined_in_order() {
        let (base, _) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item("greeting", vec![format!("{base}/part1"), format!("{base}/part2")]);

        downloader(storage.clone()).download(&item, &options()).await.unwrap();

        assert_eq!(storage.download("greeting.txt").await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_multi_thread_keeps_part_order() {
        let (base, _) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item("greeting", vec![format!("{base}/part1"), format!("{base}/part2")]);
        let options = DownloadOptions {
            multi_thread: true,
            ..options()
        };

        downloader(storage.clone()).download(&item, &options).await.unwrap();

        assert_eq!(storage.download("greeting.txt").await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (base, _) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item("gone", vec![format!("{base}/missing")]);

        let err = downloader(storage.clone())
            .download(&item, &options())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
        assert!(!storage.exists("gone.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let (base, hits) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item("flaky", vec![format!("{base}/flaky")]);

        downloader(storage.clone()).download(&item, &options()).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(storage.download("flaky.txt").await.unwrap(), b"finally");
    }

    #[tokio::test]
    async fn test_retry_budget_is_respected() {
        let (base, hits) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item("flaky", vec![format!("{base}/flaky")]);
        let options = DownloadOptions {
            retry_times: 1,
            ..options()
        };

        let err = downloader(storage).download(&item, &options).await.unwrap_err();

        assert!(matches!(err, DownloadError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_referrer_is_sent() {
        let (base, _) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item("ref", vec![format!("{base}/needs-referer")]);
        let options = DownloadOptions {
            referrer: "https://example.com/page".to_string(),
            ..options()
        };

        downloader(storage.clone()).download(&item, &options).await.unwrap();
        assert_eq!(storage.download("ref.txt").await.unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_unknown_stream_format() {
        let storage = StorageClient::in_memory();
        let item = item("x", vec!["http://127.0.0.1:1/never".to_string()]);
        let options = DownloadOptions {
            stream_format: "4k".to_string(),
            ..options()
        };

        let err = downloader(storage).download(&item, &options).await.unwrap_err();
        assert!(matches!(err, DownloadError::StreamNotFound(format) if format == "4k"));
    }

    #[tokio::test]
    async fn test_captions_saved_when_requested() {
        let (base, _) = start_server().await;
        let storage = StorageClient::in_memory();
        let mut item = item("talk", vec![format!("{base}/part1")]);
        item.captions.insert("en".to_string(), format!("{base}/en.srt"));
        let options = DownloadOptions {
            caption: true,
            ..options()
        };

        downloader(storage.clone()).download(&item, &options).await.unwrap();

        assert!(storage.exists("talk.txt").await.unwrap());
        assert!(storage.exists("talk.en.srt").await.unwrap());
    }

    #[test]
    fn test_file_name_sanitizes() {
        assert_eq!(file_name("a/b:c", "mp4"), "a_b_c.mp4");
        assert_eq!(file_name("  ", "mp4"), "download.mp4");
        assert_eq!(file_name("..", ""), "download");
        assert_eq!(file_name("clip", ""), "clip");
    }

    #[tokio::test]
    async fn test_part_larger_than_chunk_size() {
        let (base, _) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item("big", vec![format!("{base}/large"), format!("{base}/part2")]);
        let options = DownloadOptions {
            chunk_size: ByteSize(64 * 1024),
            ..options()
        };

        downloader(storage.clone()).download(&item, &options).await.unwrap();

        let mut expected = large_body();
        expected.extend_from_slice(b"world");
        assert_eq!(storage.download("big.txt").await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_multi_thread_streams_large_part_in_order() {
        let (base, _) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item(
            "big",
            vec![
                format!("{base}/part1"),
                format!("{base}/large"),
                format!("{base}/part2"),
            ],
        );
        let options = DownloadOptions {
            multi_thread: true,
            chunk_size: ByteSize(64 * 1024),
            ..options()
        };

        downloader(storage.clone()).download(&item, &options).await.unwrap();

        let mut expected = b"hello ".to_vec();
        expected.extend(large_body());
        expected.extend_from_slice(b"world");
        assert_eq!(storage.download("big.txt").await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_multi_thread_failure_stores_nothing() {
        let (base, _) = start_server().await;
        let storage = StorageClient::in_memory();
        let item = item("half", vec![format!("{base}/part1"), format!("{base}/missing")]);
        let options = DownloadOptions {
            multi_thread: true,
            ..options()
        };

        let err = downloader(storage.clone())
            .download(&item, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
        assert!(!storage.exists("half.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_part_body_is_forwarded_chunk_by_chunk() {
        let (base, _) = start_server().await;
        let fetcher = downloader(StorageClient::in_memory()).fetcher(Arc::new(Vec::new()), 0);
        let url = format!("{base}/large");

        // One slot: the body cannot be read ahead of the consumer
        let (tx, mut rx) = mpsc::channel(1);
        let pump = tokio::spawn(async move { fetcher.pump(&url, tx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!pump.is_finished(), "whole body was read without a consumer");

        let mut chunks = 0;
        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.extend_from_slice(&chunk.unwrap());
            chunks += 1;
        }
        pump.await.unwrap();

        assert!(chunks > 1);
        assert_eq!(received, large_body());
    }
}
