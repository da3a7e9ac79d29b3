//! Job state machine
//!
//! Checks a job's status against the requested operation, runs the raster
//! transforms and catalog updates, and computes the job's next status.

mod error;
mod machine;
mod notifier;
mod request;
mod types;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub use error::{DecodeError, ErrorKind, JobError, NotifyError, Result, StaleJob};
pub use machine::{JobStateMachine, Outcome};
pub use notifier::{ColorsNotification, ColorsResult, HttpNotifier, Notifier};
pub use request::{ClientId, JobRequest, Queue};
pub use types::{JobPatch, JobRecord, JobStatus};
