//! SQS queue backend
//!
//! Uses the async AWS SDK, so long-poll receives suspend on the runtime
//! instead of blocking a thread. Works against LocalStack via an optional
//! custom endpoint.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::Client;

use crate::core::config::SqsConfig;

use super::backend::{QueueBackend, QueueTarget, ReceivedMessage};
use super::error::QueueError;

/// SQS queue backend
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    documents_queue_url: String,
    index_queue_url: String,
}

impl SqsQueue {
    /// Create a new SQS backend with the given configuration
    pub async fn new(config: &SqsConfig) -> Result<Self, QueueError> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = config.region.clone() {
            config_loader = config_loader.region(aws_sdk_sqs::config::Region::new(region));
        }

        let sdk_config = config_loader.load().await;

        let mut sqs_config = aws_sdk_sqs::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = config.endpoint.clone() {
            sqs_config = sqs_config.endpoint_url(endpoint_url);
        }

        let client = Client::from_conf(sqs_config.build());

        tracing::debug!(
            documents_queue = %config.documents_queue,
            index_queue = %config.index_documents_queue,
            "SQS queue adapter initialized"
        );

        Ok(Self {
            client,
            documents_queue_url: config.documents_queue.clone(),
            index_queue_url: config.index_documents_queue.clone(),
        })
    }

    fn queue_url(&self, target: QueueTarget) -> &str {
        match target {
            QueueTarget::Processing => &self.documents_queue_url,
            QueueTarget::Indexing => &self.index_queue_url,
        }
    }
}

#[async_trait]
impl QueueBackend for SqsQueue {
    async fn receive(
        &self,
        target: QueueTarget,
        max: u32,
        wait: Duration,
        visibility: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(self.queue_url(target))
            .max_number_of_messages(max as i32)
            .wait_time_seconds(wait.as_secs() as i32)
            .visibility_timeout(visibility.as_secs() as i32)
            .send()
            .await
            .map_err(|e| QueueError::Backend(format!("SQS receive_message error: {}", e)))?;

        Ok(response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| {
                let body = msg.body?;
                let receipt = msg.receipt_handle?;
                Some(ReceivedMessage { body, receipt })
            })
            .collect())
    }

    async fn ack(&self, target: QueueTarget, receipt: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(self.queue_url(target))
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| QueueError::Backend(format!("SQS delete_message error: {}", e)))?;
        Ok(())
    }

    async fn send(
        &self,
        target: QueueTarget,
        body: &str,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let mut request = self
            .client
            .send_message()
            .queue_url(self.queue_url(target))
            .message_body(body);

        if !delay.is_zero() {
            request = request.delay_seconds(delay.as_secs() as i32);
        }

        request
            .send()
            .await
            .map_err(|e| QueueError::Backend(format!("SQS send_message error: {}", e)))?;

        tracing::debug!(queue = %target, delay_secs = delay.as_secs(), "Message sent to SQS");

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqs"
    }
}
