//! S3-based artifact store implementation
//!
//! Works against AWS S3 or S3-compatible services (MinIO, LocalStack) via an
//! optional custom endpoint with path-style addressing.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::config::S3Config;

use super::backend::{ObjectContent, StoreBackend};
use super::error::StoreError;

/// S3-based artifact store
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Create a new S3 store with the given configuration
    pub async fn new(config: &S3Config) -> Result<Self, StoreError> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = config.region.clone() {
            config_loader = config_loader.region(aws_sdk_s3::config::Region::new(region));
        }

        let sdk_config = config_loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = config.endpoint.clone() {
            // Path-style addressing is required for most S3-compatible services
            s3_config = s3_config.endpoint_url(endpoint_url).force_path_style(true);
        }

        let client = Client::from_conf(s3_config.build());

        tracing::debug!(bucket = %config.bucket, "S3 artifact store initialized");

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl StoreBackend for S3Store {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Backend(format!(
                        "S3 head_object error: {}",
                        service_err
                    )))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> Result<ObjectContent, StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StoreError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StoreError::Backend(format!("S3 get_object error: {}", service_err))
                }
            })?;

        let content_type = response.content_type().map(|s| s.to_string());
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 body read error: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(ObjectContent { data, content_type })
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 put_object error: {}", e)))?;

        tracing::debug!(key = %key, size, "Object stored in S3");

        Ok(())
    }

    async fn put_stream(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Send + Unpin>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        // The SDK needs a known content length, so buffer the reader first.
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.put(key, data, content_type).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        // S3 delete_object doesn't fail if the object doesn't exist
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 delete_object error: {}", e)))?;

        tracing::debug!(key = %key, "Object deleted from S3");

        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StoreError::Backend(format!("S3 list_objects_v2 error: {}", e)))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
