use std::fmt;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::dispatch::StoreError;
use crate::job::types::JobStatus;
use crate::raster::RasterError;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unknown queue '{0}'")]
    UnknownQueue(String),

    #[error("Malformed {queue} message: {source}")]
    Payload {
        queue: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification to {uri} failed: {source}")]
    Transport {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Notifier at {uri} answered HTTP {status}, expected 201")]
    Status { uri: String, status: u16 },

    #[error("Failed to create notifier client: {0}")]
    Client(String),
}

impl NotifyError {
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Transport { .. } => true,
            NotifyError::Status { status, .. } => *status >= 500,
            NotifyError::Client(_) => false,
        }
    }
}

/// Whether retrying the same message may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Retryable,
    Terminal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Retryable => f.write_str("retryable"),
            ErrorKind::Terminal => f.write_str("terminal"),
        }
    }
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        let retryable = match self {
            JobError::Decode(_) | JobError::Raster(_) => false,
            JobError::Store(e) => e.is_retryable(),
            JobError::Catalog(e) => e.is_retryable(),
            JobError::Notify(e) => e.is_retryable(),
        };
        if retryable {
            ErrorKind::Retryable
        } else {
            ErrorKind::Terminal
        }
    }
}

/// A message whose operation does not apply to the job's current status.
///
/// Duplicate and out-of-order deliveries end up here; they are skipped,
/// not failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} expects a job that is {expected}, but it is {actual}")]
pub struct StaleJob {
    pub operation: &'static str,
    pub expected: JobStatus,
    pub actual: JobStatus,
}

pub type Result<T> = std::result::Result<T, JobError>;
