//! Job dispatcher
//!
//! Connects a [`MessageSource`] and a [`JobStore`] to the job state machine.

mod dispatcher;
mod queue;
mod store;


pub use dispatcher::{Dispatcher, Disposition};
pub use queue::{Delivery, LineSource, MemoryQueue, MessageSource, QueueError};
pub use store::{HttpJobStore, JobStore, StoreError};
