use thiserror::Error;

use super::record::JobStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("job is already {0}; its error log is frozen")]
    Frozen(JobStatus),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
