//! Progress registry error types

use thiserror::Error;

/// Errors from progress record and notification operations
#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Registry backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<deadpool_redis::PoolError> for ProgressError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        ProgressError::Connection(e.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for ProgressError {
    fn from(e: deadpool_redis::redis::RedisError) -> Self {
        ProgressError::Backend(e.to_string())
    }
}
