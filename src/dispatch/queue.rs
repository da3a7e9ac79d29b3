//! Sources of job messages.
//!
//! The broker itself is outside this crate; anything that hands out
//! deliveries and takes acknowledgements can drive the dispatcher.

use std::collections::VecDeque;
use std::io::BufRead;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to read deliveries: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown delivery tag {0}")]
    UnknownTag(u64),
}

/// One message taken from a queue, acknowledged by `tag`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub tag: u64,
    pub queue: String,
    pub body: Vec<u8>,
}

pub trait MessageSource {
    /// Next delivery, or `None` once the source is exhausted.
    fn next_delivery(&mut self) -> Result<Option<Delivery>, QueueError>;

    fn ack(&mut self, tag: u64) -> Result<(), QueueError>;
}

/// In-memory queue, mostly for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    pending: VecDeque<Delivery>,
    unacked: Vec<u64>,
    acked: Vec<u64>,
    next_tag: u64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, queue: &str, body: impl Into<Vec<u8>>) -> u64 {
        self.next_tag += 1;
        self.pending.push_back(Delivery {
            tag: self.next_tag,
            queue: queue.to_string(),
            body: body.into(),
        });
        self.next_tag
    }

    pub fn acked(&self) -> &[u64] {
        &self.acked
    }

    pub fn unacked(&self) -> &[u64] {
        &self.unacked
    }
}

impl MessageSource for MemoryQueue {
    fn next_delivery(&mut self) -> Result<Option<Delivery>, QueueError> {
        let delivery = self.pending.pop_front();
        if let Some(d) = &delivery {
            self.unacked.push(d.tag);
        }
        Ok(delivery)
    }

    fn ack(&mut self, tag: u64) -> Result<(), QueueError> {
        let position = self
            .unacked
            .iter()
            .position(|&t| t == tag)
            .ok_or(QueueError::UnknownTag(tag))?;
        self.unacked.remove(position);
        self.acked.push(tag);
        Ok(())
    }
}

#[derive(Deserialize)]
struct Envelope {
    queue: String,
    body: serde_json::Value,
}

/// Reads one `{"queue": ..., "body": {...}}` envelope per line.
///
/// Lines that are not envelopes are logged and dropped.
pub struct LineSource<R: BufRead> {
    reader: R,
    next_tag: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, next_tag: 0 }
    }
}

impl<R: BufRead> MessageSource for LineSource<R> {
    fn next_delivery(&mut self) -> Result<Option<Delivery>, QueueError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Envelope>(trimmed) {
                Ok(envelope) => {
                    self.next_tag += 1;
                    return Ok(Some(Delivery {
                        tag: self.next_tag,
                        queue: envelope.queue,
                        body: envelope.body.to_string().into_bytes(),
                    }));
                }
                Err(e) => warn!(error = %e, "Dropping malformed envelope"),
            }
        }
    }

    fn ack(&mut self, _tag: u64) -> Result<(), QueueError> {
        Ok(())
    }
}
