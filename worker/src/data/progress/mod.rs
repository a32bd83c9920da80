//! Progress registry
//!
//! Short-TTL progress records plus pub/sub status notifications, with
//! pluggable backends:
//! - Redis (default) - deadpool-redis
//! - In-memory - tests and local development
//!
//! Records are advisory: they expire after 30 seconds and consumers of the
//! status channel must tolerate duplicates and out-of-order updates. The
//! object store remains the source of truth for completion.

mod backend;
mod error;
mod memory;
mod redis;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use backend::ProgressBackend;
pub use error::ProgressError;
pub use memory::MemoryProgress;
pub use redis::RedisProgress;

use crate::core::config::{AppConfig, ProgressBackendType};
use crate::core::constants::PROGRESS_TTL_SECS;

/// Document stage reported on the status channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Parsing,
    Chunking,
    Indexing,
    Error,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Parsing => write!(f, "parsing"),
            DocumentStatus::Chunking => write!(f, "chunking"),
            DocumentStatus::Indexing => write!(f, "indexing"),
            DocumentStatus::Error => write!(f, "error"),
        }
    }
}

/// Notification published on the status channel for every progress tick
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub document_id: String,
    pub status: DocumentStatus,
    pub status_progress: f64,
    pub status_info: Option<String>,
    pub progress: f64,
    pub sync: bool,
}

/// Progress registry service wrapping the configured backend
pub struct ProgressRegistry {
    backend: Arc<dyn ProgressBackend>,
    channel: String,
    ttl: Duration,
}

impl std::fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRegistry")
            .field("backend", &self.backend.backend_name())
            .field("channel", &self.channel)
            .finish()
    }
}

impl ProgressRegistry {
    /// Create a new progress registry from configuration
    pub async fn new(config: &AppConfig) -> Result<Self, ProgressError> {
        let backend: Arc<dyn ProgressBackend> = match config.backends.progress {
            ProgressBackendType::Redis => Arc::new(RedisProgress::new(&config.redis.url).await?),
            ProgressBackendType::Memory => Arc::new(MemoryProgress::new()),
        };
        Ok(Self {
            backend,
            channel: config.redis.status_channel.clone(),
            ttl: Duration::from_secs(PROGRESS_TTL_SECS),
        })
    }

    /// Create a registry over an explicit backend (tests, embedded use)
    pub fn with_backend(backend: Arc<dyn ProgressBackend>, channel: &str) -> Self {
        Self {
            backend,
            channel: channel.to_string(),
            ttl: Duration::from_secs(PROGRESS_TTL_SECS),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Record stage progress and publish a status notification
    pub async fn set_progress(
        &self,
        progress_key: &str,
        value: f64,
        document_id: &str,
        status: DocumentStatus,
        info: Option<&str>,
    ) -> Result<(), ProgressError> {
        self.backend.set(progress_key, value, self.ttl).await?;

        tracing::debug!(
            document_id,
            status = %status,
            progress = value,
            "Document status update"
        );

        let update = StatusUpdate {
            document_id: document_id.to_string(),
            status,
            status_progress: value,
            status_info: info.map(|s| s.to_string()),
            progress: value,
            sync: true,
        };
        self.publish(&update).await
    }

    /// Publish a status notification without touching any record
    pub async fn publish(&self, update: &StatusUpdate) -> Result<(), ProgressError> {
        let payload = serde_json::to_vec(update)
            .map_err(|e| ProgressError::Serialization(e.to_string()))?;
        self.backend.publish(&self.channel, &payload).await
    }

    /// Get a stage progress record
    pub async fn get(&self, progress_key: &str) -> Result<Option<f64>, ProgressError> {
        self.backend.get(progress_key).await
    }

    /// Atomically bump a counter record, refreshing its TTL
    pub async fn incr(&self, counter_key: &str) -> Result<i64, ProgressError> {
        self.backend.incr(counter_key, self.ttl).await
    }

    /// Drop a record
    pub async fn delete(&self, progress_key: &str) -> Result<(), ProgressError> {
        self.backend.delete(progress_key).await
    }

    /// Health check
    pub async fn health_check(&self) -> Result<(), ProgressError> {
        self.backend.health_check().await
    }
}
