//! Job dispatcher
//!
//! Decodes deliveries, fetches job records, drives the state machine and
//! stores the new status. Every delivery is acknowledged, whatever the
//! outcome: a failing job is logged with its error kind and dropped rather
//! than redelivered.

use tracing::{error, info, instrument, warn};

use crate::catalog::CatalogClient;
use crate::dispatch::queue::{Delivery, MessageSource, QueueError};
use crate::dispatch::store::JobStore;
use crate::job::{ErrorKind, JobError, JobRequest, JobStateMachine, Notifier, Outcome, Queue};

/// What became of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    Skipped,
    Failed { kind: ErrorKind },
}

pub struct Dispatcher<S: JobStore, C: CatalogClient, N: Notifier> {
    store: S,
    machine: JobStateMachine<C, N>,
}

impl<S: JobStore, C: CatalogClient, N: Notifier> Dispatcher<S, C, N> {
    pub fn new(store: S, machine: JobStateMachine<C, N>) -> Self {
        Self { store, machine }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn machine(&self) -> &JobStateMachine<C, N> {
        &self.machine
    }

    /// Handles deliveries until the source runs dry; returns how many.
    pub fn run<M: MessageSource>(&self, source: &mut M) -> Result<usize, QueueError> {
        let mut handled = 0;
        while let Some(delivery) = source.next_delivery()? {
            self.handle(&delivery);
            source.ack(delivery.tag)?;
            handled += 1;
        }
        info!(handled, "Message source exhausted");
        Ok(handled)
    }

    #[instrument(skip_all, fields(tag = delivery.tag, queue = %delivery.queue))]
    pub fn handle(&self, delivery: &Delivery) -> Disposition {
        match self.process(delivery) {
            Ok(Outcome::Skipped(stale)) => {
                warn!(%stale, "Job skipped");
                Disposition::Skipped
            }
            Ok(_) => Disposition::Applied,
            Err(e) => {
                let kind = e.kind();
                error!(error = %e, %kind, "Job failed");
                Disposition::Failed { kind }
            }
        }
    }

    fn process(&self, delivery: &Delivery) -> Result<Outcome, JobError> {
        let queue: Queue = delivery.queue.parse()?;
        let request = JobRequest::decode(queue, &delivery.body)?;
        let record = self.store.fetch(request.uri())?;

        let outcome = self.machine.handle(&request, &record)?;

        if let Some(patch) = outcome.patch() {
            self.store.update(request.uri(), &patch)?;
        }
        Ok(outcome)
    }
}
