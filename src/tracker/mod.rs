//! Job tracker: the entry points the HTTP boundary calls.
//!
//! [`JobTracker::create_job`] validates a request, registers the job and
//! spawns its runner without waiting for it. The listing calls return
//! point-in-time copies and never block on a running job.

mod validation;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::extract::{DirectExtractor, Extractor};
use crate::ledger::{DEFAULT_HISTORY_CAPACITY, JobView, Ledger};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::storage::StorageClient;
use crate::worker::{
    DownloadError, Downloader, DownloaderSettings, HttpConfig, HttpDownloader, RunnerContext,
    run_job,
};

pub use validation::{JobRequest, ValidationError, validate_request};

/// Tunables for a [`JobTracker`]
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub history_capacity: usize,
    /// Jobs allowed past `Created` at the same time; 0 disables the cap
    pub max_concurrent_jobs: usize,
    pub downloader: DownloaderSettings,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_concurrent_jobs: 0,
            downloader: DownloaderSettings::default(),
        }
    }
}

impl TrackerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            history_capacity: config.jobs.history_capacity,
            max_concurrent_jobs: config.jobs.max_concurrent_jobs,
            downloader: DownloaderSettings {
                multi_thread: config.download.multi_thread,
                chunk_size: config.download.chunk_size,
                retry_times: config.download.retry_times,
            },
        }
    }
}

#[derive(Clone)]
pub struct JobTracker {
    ctx: Arc<RunnerContext>,
}

impl JobTracker {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        downloader: Arc<dyn Downloader>,
        settings: TrackerSettings,
    ) -> Self {
        let limiter = match settings.max_concurrent_jobs {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n.min(Semaphore::MAX_PERMITS)))),
        };

        Self {
            ctx: Arc::new(RunnerContext {
                ledger: Arc::new(Ledger::new(settings.history_capacity)),
                extractor,
                downloader,
                settings: settings.downloader,
                limiter,
                metrics: Arc::new(Metrics::new()),
            }),
        }
    }

    /// Tracker with the built-in direct extractor and HTTP downloader
    pub fn from_config(config: &Config, storage: StorageClient) -> Result<Self, DownloadError> {
        let downloader = HttpDownloader::new(HttpConfig::default(), storage)?;
        Ok(Self::new(
            Arc::new(DirectExtractor::new()),
            Arc::new(downloader),
            TrackerSettings::from_config(config),
        ))
    }

    /// Accept a job and start it in the background.
    ///
    /// Returns the freshly created view; the caller polls for progress.
    /// Must be called from within a tokio runtime.
    pub fn create_job(&self, request: JobRequest) -> Result<JobView, ValidationError> {
        let params = validate_request(request)?;
        let (record, handle) = self.ctx.ledger.begin(params);
        let view = record.view();

        self.ctx.metrics.job_accepted();
        info!(job_id = %view.id, url = %view.url, "Job accepted");

        tokio::spawn(run_job(self.ctx.clone(), record, handle));

        Ok(view)
    }

    pub fn list_active_jobs(&self) -> Vec<JobView> {
        self.ctx.ledger.active()
    }

    pub fn list_history(&self) -> Vec<JobView> {
        self.ctx.ledger.history()
    }

    pub fn find_job(&self, id: Uuid) -> Option<JobView> {
        self.ctx.ledger.find(id)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// Jobs accepted but not yet moved to history
    pub fn outstanding(&self) -> usize {
        self.ctx.ledger.outstanding()
    }

    /// Resolve once every accepted job has reached history
    pub async fn wait_idle(&self) {
        self.ctx.ledger.wait_settled().await
    }
}
