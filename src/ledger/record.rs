use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{LedgerError, Result};

/// Lifecycle of a download job.
///
/// `Created -> Extracting -> Downloading -> {Done | Failed | PartlyDone}`,
/// with `Failed` also reachable straight from `Extracting` (extraction
/// failed) or from any non-terminal state when the runner aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Created,
    Extracting,
    Downloading,
    Done,
    Failed,
    PartlyDone,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::PartlyDone)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        match (self, next) {
            (Created, Extracting) => true,
            (Extracting, Downloading) => true,
            (Downloading, Done | PartlyDone) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "Created",
            JobStatus::Extracting => "Extracting",
            JobStatus::Downloading => "Downloading",
            JobStatus::Done => "Done",
            JobStatus::Failed => "Failed",
            JobStatus::PartlyDone => "PartlyDone",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, immutable parameters of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobParams {
    pub url: String,
    pub caption: bool,
    pub cookie: String,
    pub referrer: String,
    pub stream_format: String,
}

/// Point-in-time copy of a job, safe to hand out without locking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    pub id: Uuid,
    pub url: String,
    pub caption: bool,
    pub cookie: String,
    #[serde(rename = "refer")]
    pub referrer: String,
    #[serde(rename = "stream-format")]
    pub stream_format: String,
    pub status: JobStatus,
    pub errors: Vec<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    errors: Vec<String>,
    finished_at: Option<DateTime<Utc>>,
}

/// Mutable state of one in-flight job.
///
/// Parameters are fixed at construction; status and the error log sit behind
/// the record's own lock, which is only ever held for a single read or write.
#[derive(Debug)]
pub struct JobRecord {
    id: Uuid,
    params: JobParams,
    created_at: DateTime<Utc>,
    state: RwLock<JobState>,
}

impl JobRecord {
    pub fn new(params: JobParams) -> Self {
        Self {
            id: Uuid::now_v7(),
            params,
            created_at: Utc::now(),
            state: RwLock::new(JobState {
                status: JobStatus::Created,
                errors: Vec::new(),
                finished_at: None,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn params(&self) -> &JobParams {
        &self.params
    }

    pub fn status(&self) -> JobStatus {
        self.read().status
    }

    pub fn errors(&self) -> Vec<String> {
        self.read().errors.clone()
    }

    /// Move to `next`, rejecting anything the state machine does not allow.
    pub fn advance(&self, next: JobStatus) -> Result<()> {
        let mut state = self.write();
        transition(&mut state, next)
    }

    /// Append one message to the error log.
    pub fn push_error(&self, message: impl Into<String>) -> Result<()> {
        let mut state = self.write();
        if state.status.is_terminal() {
            return Err(LedgerError::Frozen(state.status));
        }
        state.errors.push(message.into());
        Ok(())
    }

    /// Record `message` and move to `Failed` under one lock acquisition.
    pub fn fail(&self, message: impl Into<String>) -> Result<()> {
        let mut state = self.write();
        if !state.status.can_transition_to(JobStatus::Failed) {
            return Err(LedgerError::InvalidTransition {
                from: state.status,
                to: JobStatus::Failed,
            });
        }
        state.errors.push(message.into());
        transition(&mut state, JobStatus::Failed)
    }

    pub fn view(&self) -> JobView {
        let state = self.read();
        JobView {
            id: self.id,
            url: self.params.url.clone(),
            caption: self.params.caption,
            cookie: self.params.cookie.clone(),
            referrer: self.params.referrer.clone(),
            stream_format: self.params.stream_format.clone(),
            status: state.status,
            errors: state.errors.clone(),
            created_at: self.created_at,
            finished_at: state.finished_at,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, JobState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, JobState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn transition(state: &mut JobState, next: JobStatus) -> Result<()> {
    if !state.status.can_transition_to(next) {
        return Err(LedgerError::InvalidTransition {
            from: state.status,
            to: next,
        });
    }
    state.status = next;
    if next.is_terminal() {
        state.finished_at = Some(Utc::now());
    }
    Ok(())
}
