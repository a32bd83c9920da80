//! Artifact store gateway
//!
//! Typed access to document artifacts by object key, with pluggable
//! backends:
//! - S3 (default) - aws-sdk-s3, optionally against MinIO/LocalStack
//! - In-memory - tests and local development

mod backend;
mod error;
mod memory;
mod s3;

use std::sync::Arc;

use tokio::io::AsyncRead;

pub use backend::{ObjectContent, StoreBackend};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use s3::S3Store;

use crate::core::config::{AppConfig, StoreBackendType};

/// Artifact store service wrapping the configured backend
pub struct ArtifactStore {
    backend: Arc<dyn StoreBackend>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl ArtifactStore {
    /// Create a new artifact store from configuration
    pub async fn new(config: &AppConfig) -> Result<Self, StoreError> {
        let backend: Arc<dyn StoreBackend> = match config.backends.store {
            StoreBackendType::S3 => Arc::new(S3Store::new(&config.s3).await?),
            StoreBackendType::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(Self { backend })
    }

    /// Create a store over an explicit backend (tests, embedded use)
    pub fn with_backend(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Check whether an object exists
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.backend.exists(key).await
    }

    /// Fetch object bytes plus recorded content type
    pub async fn get_bytes(&self, key: &str) -> Result<ObjectContent, StoreError> {
        self.backend.get(key).await
    }

    /// Fetch an object and decode it as UTF-8 text
    pub async fn get_text(&self, key: &str) -> Result<String, StoreError> {
        let content = self.backend.get(key).await?;
        String::from_utf8(content.data)
            .map_err(|e| StoreError::Backend(format!("Object {} is not valid UTF-8: {}", key, e)))
    }

    /// Store raw bytes
    pub async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.backend.put(key, data, content_type).await
    }

    /// Store UTF-8 text
    pub async fn put_text(
        &self,
        key: &str,
        text: String,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.backend.put(key, text.into_bytes(), content_type).await
    }

    /// Store from an async reader
    pub async fn put_stream(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Send + Unpin>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.backend.put_stream(key, reader, content_type).await
    }

    /// Delete an object (missing objects are ignored)
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.backend.delete(key).await
    }

    /// List keys under a prefix, optionally filtered
    pub async fn list_by_prefix(
        &self,
        prefix: &str,
        filter: impl Fn(&str) -> bool,
    ) -> Result<Vec<String>, StoreError> {
        let keys = self.backend.list_by_prefix(prefix).await?;
        Ok(keys.into_iter().filter(|k| filter(k)).collect())
    }
}
