//! Job runner - drives one job from `Created` to a terminal status

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::download::{DownloadOptions, Downloader, DownloaderSettings};
use super::guard::CompletionGuard;
use crate::extract::{ExtractOptions, Extractor};
use crate::ledger::{JobHandle, JobRecord, JobStatus, Ledger, Result};
use crate::observability::Metrics;

/// Shared collaborators and settings handed to every runner
pub struct RunnerContext {
    pub ledger: Arc<Ledger>,
    pub extractor: Arc<dyn Extractor>,
    pub downloader: Arc<dyn Downloader>,
    pub settings: DownloaderSettings,
    /// Caps how many jobs leave `Created` at once; `None` means no cap
    pub limiter: Option<Arc<Semaphore>>,
    pub metrics: Arc<Metrics>,
}

/// Success and failure counts over the extracted items
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
}

impl Tally {
    pub fn outcome(self) -> JobStatus {
        if self.failed == 0 {
            JobStatus::Done
        } else if self.succeeded == 0 {
            JobStatus::Failed
        } else {
            JobStatus::PartlyDone
        }
    }
}

/// Run `record` to completion, then retire it into history.
///
/// Retirement happens exactly once whatever path the job takes.
pub async fn run_job(ctx: Arc<RunnerContext>, record: Arc<JobRecord>, handle: JobHandle) {
    let _guard = CompletionGuard {
        ledger: ctx.ledger.clone(),
        metrics: ctx.metrics.clone(),
        record: record.clone(),
        handle: Some(handle),
    };

    let _permit = match &ctx.limiter {
        Some(limiter) => match limiter.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!(job_id = %record.id(), "Job limiter closed");
                return;
            }
        },
        None => None,
    };

    if let Err(e) = drive(&ctx, &record).await {
        warn!(job_id = %record.id(), error = %e, "Job state machine rejected a step");
    }
}

async fn drive(ctx: &RunnerContext, record: &JobRecord) -> Result<()> {
    let job_id = record.id();
    let params = record.params();

    record.advance(JobStatus::Extracting)?;
    info!(%job_id, url = %params.url, "Extracting");

    let extract_options = ExtractOptions {
        cookie: params.cookie.clone(),
    };
    let items = match ctx.extractor.extract(&params.url, &extract_options).await {
        Ok(items) => items,
        Err(e) => {
            warn!(%job_id, error = %e, "Extraction failed");
            return record.fail(e.to_string());
        }
    };

    record.advance(JobStatus::Downloading)?;
    info!(%job_id, items = items.len(), "Downloading");

    let options = DownloadOptions::for_job(&ctx.settings, params);
    let mut tally = Tally::default();

    for item in &items {
        if let Some(e) = &item.error {
            warn!(%job_id, item = %item.url, error = %e, "Item failed to resolve");
            record.push_error(e.to_string())?;
            tally.failed += 1;
            continue;
        }

        match ctx.downloader.download(item, &options).await {
            Ok(()) => {
                debug!(%job_id, title = %item.title, "Item downloaded");
                tally.succeeded += 1;
            }
            Err(e) => {
                warn!(%job_id, title = %item.title, error = %e, "Item download failed");
                record.push_error(e.to_string())?;
                tally.failed += 1;
            }
        }
    }

    record.advance(tally.outcome())
}
