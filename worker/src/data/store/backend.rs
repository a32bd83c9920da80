//! Object store backend trait definition

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::StoreError;

/// Object content with its content type
#[derive(Debug, Clone)]
pub struct ObjectContent {
    /// Raw object bytes
    pub data: Vec<u8>,
    /// Content type as recorded by the store, if any
    pub content_type: Option<String>,
}

/// Trait for object store backends
///
/// All implementations must be thread-safe (Send + Sync); services share one
/// client across pollers. Keys are opaque strings owned by the pipeline; the
/// backend never derives or interprets them.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Check whether an object exists
    ///
    /// A missing object is `Ok(false)`, not an error.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Fetch an object's bytes and content type
    ///
    /// Fails with [`StoreError::NotFound`] when the object is absent.
    async fn get(&self, key: &str) -> Result<ObjectContent, StoreError>;

    /// Store an object
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    /// Store an object from an async reader
    async fn put_stream(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Send + Unpin>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Delete an object
    ///
    /// Deleting an absent object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List object keys under a prefix
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}
