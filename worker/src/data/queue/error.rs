//! Queue adapter error types

use thiserror::Error;

/// Errors from queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Unknown receipt handle: {0}")]
    UnknownReceipt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
