use super::models::Config;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Upper bound on request bodies; job requests are a handful of short strings
const MAX_PAYLOAD_LIMIT: u64 = 1024 * 1024;
const MAX_RETRY_TIMES: u32 = 100;
/// Finished jobs are served whole by `/history`
const MAX_HISTORY_CAPACITY: usize = 10_000;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("max_payload_bytes ({actual}) exceeds limit of 1MB ({limit})")]
    PayloadLimitTooLarge { actual: u64, limit: u64 },

    #[error("max_payload_bytes must be positive")]
    ZeroPayloadLimit,

    #[error("download.output_path must not be empty")]
    EmptyOutputPath,

    #[error("download.chunk_size must be positive")]
    ZeroChunkSize,

    #[error("download.retry_times ({0}) exceeds limit of {MAX_RETRY_TIMES}")]
    TooManyRetries(u32),

    #[error("jobs.history_capacity must be positive")]
    ZeroHistoryCapacity,

    #[error("jobs.history_capacity ({0}) exceeds limit of {MAX_HISTORY_CAPACITY}")]
    HistoryCapacityTooLarge(usize),

    #[error("jobs.max_concurrent_jobs ({actual}) exceeds limit of {limit}")]
    TooManyConcurrentJobs { actual: usize, limit: usize },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_download(config)?;
    validate_jobs(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    let payload = config.server.api.max_payload_bytes.as_u64();
    if payload == 0 {
        return Err(ValidationError::ZeroPayloadLimit);
    }
    if payload > MAX_PAYLOAD_LIMIT {
        return Err(ValidationError::PayloadLimitTooLarge {
            actual: payload,
            limit: MAX_PAYLOAD_LIMIT,
        });
    }

    if config.server.token.is_empty() {
        tracing::warn!("server.token is empty; only requests without a token will be accepted");
    }

    Ok(())
}

fn validate_download(config: &Config) -> Result<(), ValidationError> {
    if config.download.output_path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyOutputPath);
    }

    if config.download.chunk_size.as_u64() == 0 {
        return Err(ValidationError::ZeroChunkSize);
    }

    if config.download.retry_times > MAX_RETRY_TIMES {
        return Err(ValidationError::TooManyRetries(config.download.retry_times));
    }

    Ok(())
}

fn validate_jobs(config: &Config) -> Result<(), ValidationError> {
    let history_capacity = config.jobs.history_capacity;
    if history_capacity == 0 {
        return Err(ValidationError::ZeroHistoryCapacity);
    }
    if history_capacity > MAX_HISTORY_CAPACITY {
        return Err(ValidationError::HistoryCapacityTooLarge(history_capacity));
    }

    if config.jobs.max_concurrent_jobs > Semaphore::MAX_PERMITS {
        return Err(ValidationError::TooManyConcurrentJobs {
            actual: config.jobs.max_concurrent_jobs,
            limit: Semaphore::MAX_PERMITS,
        });
    }

    Ok(())
}
