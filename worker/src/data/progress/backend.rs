//! Progress registry backend trait definition

use std::time::Duration;

use async_trait::async_trait;

use super::error::ProgressError;

/// Trait for progress registry backends
///
/// Records are advisory and short-lived; TTL expiry is normal operation, not
/// an error. The authoritative completion signal lives in the object store.
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    /// Set a float progress record with a TTL
    async fn set(&self, key: &str, value: f64, ttl: Duration) -> Result<(), ProgressError>;

    /// Get a float progress record
    ///
    /// Returns None when the record is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<f64>, ProgressError>;

    /// Atomic increment with TTL refresh; creates the counter at 1
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, ProgressError>;

    /// Delete a record
    async fn delete(&self, key: &str) -> Result<(), ProgressError>;

    /// Publish a notification payload on a pub/sub channel
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), ProgressError>;

    /// Health check (validates connection)
    async fn health_check(&self) -> Result<(), ProgressError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}
