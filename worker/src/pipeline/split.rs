//! Split flow: canonical report → token-bounded chunks
//!
//! Reads `K.parsed.json`, prepares per-page text, splits it into chunks and
//! writes `K.chunked.json`, then hands the document to the indexing queue.

use std::time::Duration;

use crate::core::constants::REQUEUE_DELAY_SECS;
use crate::data::progress::DocumentStatus;
use crate::data::queue::{AckToken, QueueTarget};
use crate::domain::command::Command;
use crate::domain::keys::DocumentKeys;
use crate::domain::report::ProcessedReport;
use crate::domain::splitter::TextSplitter;
use crate::domain::text::PageTextPreparation;

use super::{Orchestrator, Outcome, PipelineError};

const JSON_MIME: &str = "application/json";

impl Orchestrator {
    /// Chunk a parsed document for indexing
    pub(super) async fn handle_split(
        &self,
        cmd: &Command,
        ack: AckToken,
    ) -> Result<Outcome, PipelineError> {
        let keys = DocumentKeys::new(&cmd.s3_key);
        let chunking_key = keys.chunking_progress();

        if let Some(p) = self.progress.get(&chunking_key).await? {
            if self.store.exists(&keys.chunked_json()).await? {
                tracing::info!(
                    document_id = %cmd.document_id,
                    "Document already chunked, skipping to index"
                );
                self.send_index(cmd).await?;
                ack.ack().await?;
                return Ok(Outcome::Completed);
            }
            if p < 1.0 {
                tracing::info!(
                    document_id = %cmd.document_id,
                    progress = p,
                    "Document chunking in progress, delaying"
                );
                self.queue
                    .send_json(
                        QueueTarget::Processing,
                        cmd,
                        Duration::from_secs(REQUEUE_DELAY_SECS as u64),
                    )
                    .await?;
                ack.ack().await?;
                return Ok(Outcome::Completed);
            }
            // p >= 1 but the artifact is gone: fall through and rebuild it
        }

        self.progress
            .set_progress(&chunking_key, 0.0, &cmd.document_id, DocumentStatus::Chunking, None)
            .await?;

        let parsed_text = self.store.get_text(&keys.parsed_json()).await?;
        let report: ProcessedReport =
            tokio::task::spawn_blocking(move || serde_json::from_str(&parsed_text))
                .await
                .map_err(|e| PipelineError::Internal(e.to_string()))?
                .map_err(|e| {
                    PipelineError::Internal(format!("Invalid parsed report: {}", e))
                })?;

        self.progress
            .set_progress(&chunking_key, 0.3, &cmd.document_id, DocumentStatus::Chunking, None)
            .await?;

        let prepared =
            tokio::task::spawn_blocking(move || PageTextPreparation::new(&report).process_report())
                .await
                .map_err(|e| PipelineError::Internal(e.to_string()))?;

        self.progress
            .set_progress(&chunking_key, 0.6, &cmd.document_id, DocumentStatus::Chunking, None)
            .await?;

        let chunked = tokio::task::spawn_blocking(move || {
            let splitter = TextSplitter::default();
            let chunked = splitter.split_report(prepared);
            serde_json::to_string_pretty(&chunked)
        })
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))?
        .map_err(|e| PipelineError::Internal(format!("Failed to serialize chunks: {}", e)))?;

        self.progress
            .set_progress(&chunking_key, 0.8, &cmd.document_id, DocumentStatus::Chunking, None)
            .await?;

        self.store
            .put_text(&keys.chunked_json(), chunked, JSON_MIME)
            .await?;

        self.progress
            .set_progress(&chunking_key, 1.0, &cmd.document_id, DocumentStatus::Chunking, None)
            .await?;
        self.send_index(cmd).await?;
        ack.ack().await?;

        tracing::info!(document_id = %cmd.document_id, "Successfully chunked document");
        Ok(Outcome::Completed)
    }

    async fn send_index(&self, cmd: &Command) -> Result<(), PipelineError> {
        self.queue
            .send_json(
                QueueTarget::Indexing,
                &Command::index_document(&cmd.document_id, &cmd.s3_key),
                Duration::ZERO,
            )
            .await?;
        Ok(())
    }
}
