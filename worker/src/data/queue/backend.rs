//! Queue backend trait definition

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use super::error::QueueError;

/// Logical queue addressed by the worker
///
/// The processing queue carries parse/split commands and is both read and
/// written; the indexing queue only ever receives `index_document` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueTarget {
    Processing,
    Indexing,
}

impl fmt::Display for QueueTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueTarget::Processing => write!(f, "processing"),
            QueueTarget::Indexing => write!(f, "indexing"),
        }
    }
}

/// A message pulled off a queue, identified by its receipt handle
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt: String,
}

/// Trait for queue backends
///
/// Acknowledgement is decoupled from receipt: the orchestrator may move the
/// receipt handle into a background task and ack long after the receive call
/// returned. Unacked messages become visible again after the visibility
/// timeout.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Long-poll for messages
    ///
    /// Returns at most `max` messages after waiting up to `wait`. Received
    /// messages stay invisible to other consumers for `visibility`.
    async fn receive(
        &self,
        target: QueueTarget,
        max: u32,
        wait: Duration,
        visibility: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Delete a message by receipt handle
    async fn ack(&self, target: QueueTarget, receipt: &str) -> Result<(), QueueError>;

    /// Enqueue a message with an optional delivery delay
    async fn send(
        &self,
        target: QueueTarget,
        body: &str,
        delay: Duration,
    ) -> Result<(), QueueError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}
