//! Tracing setup and job outcome counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

use crate::ledger::JobStatus;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` for this crate when
/// `debug` is on.
pub fn init_tracing(debug: bool) {
    let default_directive = if debug { "info,grabd=debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Counters for accepted and finished jobs
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_accepted: AtomicU64,
    jobs_done: AtomicU64,
    jobs_partly_done: AtomicU64,
    jobs_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_accepted(&self) {
        self.jobs_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_accepted", "Metric incremented");
    }

    pub fn job_finished(&self, status: JobStatus) {
        let (counter, name) = match status {
            JobStatus::Done => (&self.jobs_done, "jobs_done"),
            JobStatus::PartlyDone => (&self.jobs_partly_done, "jobs_partly_done"),
            JobStatus::Failed => (&self.jobs_failed, "jobs_failed"),
            other => {
                tracing::warn!(status = %other, "Ignoring non-terminal job outcome");
                return;
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = name, "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_done: self.jobs_done.load(Ordering::Relaxed),
            jobs_partly_done: self.jobs_partly_done.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_accepted: u64,
    pub jobs_done: u64,
    pub jobs_partly_done: u64,
    pub jobs_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_outcomes() {
        let metrics = Metrics::new();
        metrics.job_accepted();
        metrics.job_accepted();
        metrics.job_finished(JobStatus::Done);
        metrics.job_finished(JobStatus::Failed);
        metrics.job_finished(JobStatus::Downloading);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                jobs_accepted: 2,
                jobs_done: 1,
                jobs_partly_done: 0,
                jobs_failed: 1,
            }
        );
    }
}
