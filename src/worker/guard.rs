//! RAII guard that retires a job when its runner exits.

use std::sync::Arc;

use tracing::{info, warn};

use crate::ledger::{JobHandle, JobRecord, Ledger};
use crate::observability::Metrics;

pub(crate) const ABORTED_MESSAGE: &str = "job aborted before completion";

/// Moves the job from the registry into history when dropped.
///
/// Runs on every exit path of the runner, including an unwinding panic
/// inside a collaborator. A job that never reached a terminal status is
/// failed first so history only ever holds finished jobs.
pub(super) struct CompletionGuard {
    pub(super) ledger: Arc<Ledger>,
    pub(super) metrics: Arc<Metrics>,
    pub(super) record: Arc<JobRecord>,
    pub(super) handle: Option<JobHandle>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let job_id = self.record.id();

        if !self.record.status().is_terminal() {
            warn!(%job_id, status = %self.record.status(), "Job runner exited early");
            if let Err(e) = self.record.fail(ABORTED_MESSAGE) {
                warn!(%job_id, error = %e, "Could not close aborted job");
            }
        }

        // Counters are final before the job leaves the registry
        let status = self.record.status();
        self.metrics.job_finished(status);

        if let Some(handle) = self.handle.take() {
            self.ledger.settle(handle, &self.record);
        }

        info!(%job_id, %status, errors = self.record.errors().len(), "Job finished");
    }
}
