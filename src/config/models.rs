use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Shared secret every request must carry as `?token=`
    #[serde(default)]
    pub token: String,
    /// Verbose logging for this crate
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub api: ApiLimits,
}

/// API request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            token: String::new(),
            debug: false,
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(64 * 1024) // 64 KB
}

/// Where and how items are fetched
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Directory downloaded files are written to
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Part size of chunked writes to storage
    #[serde(default = "default_chunk_size")]
    pub chunk_size: ByteSize,
    /// Fetch the parts of a multi-part stream concurrently
    #[serde(default)]
    pub multi_thread: bool,
    /// Extra attempts after a transient failure
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            chunk_size: default_chunk_size(),
            multi_thread: false,
            retry_times: default_retry_times(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_chunk_size() -> ByteSize {
    ByteSize(1024 * 1024) // 1 MB
}

fn default_retry_times() -> u32 {
    3
}

/// Job bookkeeping limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Finished jobs kept for `/history`
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Jobs processed at once; 0 means unbounded
    #[serde(default)]
    pub max_concurrent_jobs: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            max_concurrent_jobs: 0,
        }
    }
}

fn default_history_capacity() -> usize {
    crate::ledger::DEFAULT_HISTORY_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.server.api.max_payload_bytes.as_u64(), 64 * 1024);
        assert!(config.server.token.is_empty());
        assert_eq!(config.download.output_path, PathBuf::from("downloads"));
        assert_eq!(config.download.chunk_size.as_u64(), 1024 * 1024);
        assert_eq!(config.download.retry_times, 3);
        assert_eq!(config.jobs.history_capacity, 10);
        assert_eq!(config.jobs.max_concurrent_jobs, 0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[download]
chunk_size = "8MB"
multi_thread = true
            "#,
        )
        .unwrap();

        assert_eq!(config.download.chunk_size.as_u64(), 8 * 1024 * 1024);
        assert!(config.download.multi_thread);
        assert_eq!(config.download.retry_times, 3);
        assert_eq!(config.jobs.history_capacity, 10);
    }
}
