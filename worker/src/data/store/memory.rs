//! In-memory artifact store
//!
//! Holds objects in a process-local map. Suitable for tests and local
//! development; nothing survives a restart.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::backend::{ObjectContent, StoreBackend};
use super::error::StoreError;

/// In-memory artifact store
#[derive(Clone, Default)]
pub struct MemoryStore {
    // BTreeMap keeps listings in key order, matching S3's lexicographic listing
    objects: Arc<RwLock<BTreeMap<String, ObjectContent>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects (test helper)
    pub fn len(&self) -> usize {
        self.objects.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .objects
            .read()
            .expect("store lock poisoned")
            .contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<ObjectContent, StoreError> {
        self.objects
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        self.objects.write().expect("store lock poisoned").insert(
            key.to_string(),
            ObjectContent {
                data,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn put_stream(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Send + Unpin>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.put(key, data, content_type).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects
            .write()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .read()
            .expect("store lock poisoned")
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("u/doc.pdf", b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap();

        let content = store.get("u/doc.pdf").await.unwrap();
        assert_eq!(content.data, b"%PDF");
        assert_eq!(content.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let store = MemoryStore::new();
        store.put("a", vec![1], "text/plain").await.unwrap();
        assert!(store.exists("a").await.unwrap());

        store.delete("a").await.unwrap();
        assert!(!store.exists("a").await.unwrap());

        // Deleting a missing object is fine
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = MemoryStore::new();
        store.put("u/d.pdf.part0", vec![], "application/pdf").await.unwrap();
        store.put("u/d.pdf.part1", vec![], "application/pdf").await.unwrap();
        store.put("u/other.pdf", vec![], "application/pdf").await.unwrap();

        let keys = store.list_by_prefix("u/d.pdf.part").await.unwrap();
        assert_eq!(keys, vec!["u/d.pdf.part0", "u/d.pdf.part1"]);
    }

    #[tokio::test]
    async fn test_put_stream() {
        let store = MemoryStore::new();
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(&b"streamed"[..]);
        store.put_stream("s", reader, "text/plain").await.unwrap();
        assert_eq!(store.get("s").await.unwrap().data, b"streamed");
    }
}
