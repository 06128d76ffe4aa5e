//! In-memory bookkeeping for download jobs.
//!
//! - [`JobRecord`] holds one job's status and error log behind its own lock
//! - [`JobRegistry`] lists the jobs that are still running, in arrival order
//! - [`HistoryRing`] keeps immutable copies of the last finished jobs
//!
//! [`Ledger`] ties the three together. A job enters through
//! [`Ledger::begin`] and leaves through [`Ledger::settle`], which moves its
//! final view from the registry into the history ring.
//!
//! ## Lock order
//!
//! The registry lock is never held while a record lock is taken: listings
//! clone the `Arc<JobRecord>` pointers first and copy each record afterwards.
//! No lock in this module is held across an `.await`.

pub mod error;
pub mod history;
pub mod record;
pub mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

pub use error::{LedgerError, Result};
pub use history::{DEFAULT_HISTORY_CAPACITY, HistoryRing};
pub use record::{JobParams, JobRecord, JobStatus, JobView};
pub use registry::{JobHandle, JobRegistry};

#[derive(Debug)]
pub struct Ledger {
    registry: JobRegistry,
    history: HistoryRing,
    outstanding: AtomicUsize,
    settled: Notify,
}

impl Ledger {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            registry: JobRegistry::new(),
            history: HistoryRing::new(history_capacity),
            outstanding: AtomicUsize::new(0),
            settled: Notify::new(),
        }
    }

    /// Register a new job in `Created` state.
    pub fn begin(&self, params: JobParams) -> (Arc<JobRecord>, JobHandle) {
        let record = Arc::new(JobRecord::new(params));
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let handle = self.registry.insert(record.clone());
        debug!(job_id = %record.id(), "Job registered");
        (record, handle)
    }

    /// Move a finished job from the registry into the history ring.
    pub fn settle(&self, handle: JobHandle, record: &JobRecord) {
        self.registry.remove(handle);
        self.history.push(record.view());
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.settled.notify_waiters();
        debug!(job_id = %record.id(), "Job moved to history");
    }

    pub fn active(&self) -> Vec<JobView> {
        self.registry.snapshot()
    }

    pub fn history(&self) -> Vec<JobView> {
        self.history.snapshot()
    }

    /// Look a job up among running jobs first, then in history.
    pub fn find(&self, id: Uuid) -> Option<JobView> {
        if let Some(record) = self.registry.get(id) {
            return Some(record.view());
        }
        self.history.snapshot().into_iter().rev().find(|view| view.id == id)
    }

    /// Jobs begun but not yet settled.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Resolve once every begun job has been settled.
    pub async fn wait_settled(&self) {
        loop {
            let notified = self.settled.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params(url: &str) -> JobParams {
        JobParams {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_settle_moves_job_to_history() {
        let ledger = Ledger::default();
        let (record, handle) = ledger.begin(params("https://example.com/a"));
        assert_eq!(ledger.active().len(), 1);
        assert_eq!(ledger.outstanding(), 1);

        record.advance(JobStatus::Extracting).unwrap();
        record.fail("unsupported url").unwrap();
        ledger.settle(handle, &record);

        assert!(ledger.active().is_empty());
        assert_eq!(ledger.outstanding(), 0);

        let history = ledger.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobStatus::Failed);
        assert_eq!(history[0].errors, vec!["unsupported url"]);
    }

    #[test]
    fn test_find_checks_active_then_history() {
        let ledger = Ledger::default();
        let (running, _running_handle) = ledger.begin(params("https://example.com/a"));
        let (done, done_handle) = ledger.begin(params("https://example.com/b"));
        done.fail("boom").unwrap();
        ledger.settle(done_handle, &done);

        assert_eq!(ledger.find(running.id()).unwrap().status, JobStatus::Created);
        assert_eq!(ledger.find(done.id()).unwrap().status, JobStatus::Failed);
        assert!(ledger.find(Uuid::now_v7()).is_none());
    }

    #[tokio::test]
    async fn test_wait_settled_returns_immediately_when_idle() {
        let ledger = Ledger::default();
        tokio::time::timeout(Duration::from_secs(1), ledger.wait_settled())
            .await
            .expect("idle ledger should not block");
    }

    #[tokio::test]
    async fn test_wait_settled_wakes_after_last_job() {
        let ledger = Arc::new(Ledger::default());
        let (record, handle) = ledger.begin(params("https://example.com/a"));

        let waiter = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.wait_settled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        record.fail("boom").unwrap();
        ledger.settle(handle, &record);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(ledger.history().len(), 1);
    }
}
