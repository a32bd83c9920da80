//! Pipeline orchestrator
//!
//! Dispatches queue commands through the stage state machine
//! (parse → split → index), enforcing the idempotency protocol: the object
//! store is the source of truth for completion, progress records only gate
//! duplicate concurrent work, and every flow ends by either acking the
//! message or leaving it for redelivery.

mod host;
mod parse;
mod split;

use std::sync::Arc;

use thiserror::Error;

pub use host::WorkerHost;

use crate::data::progress::{DocumentStatus, ProgressError, ProgressRegistry};
use crate::data::queue::{AckToken, QueueAdapter, QueueError};
use crate::data::store::{ArtifactStore, StoreError};
use crate::domain::command::{Command, CommandKind};
use crate::domain::keys::DocumentKeys;
use crate::parser::DocumentParser;

/// Errors that abort a flow and leave the message unacked for redelivery
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),

    #[error("Processing cancelled by shutdown")]
    Cancelled,
}

/// How a command was handled
pub enum Outcome {
    /// The flow completed (or short-circuited) and acked inline
    Completed,
    /// A background task owns the remaining work and the ack
    Background(tokio::task::JoinHandle<()>),
}

/// The pipeline orchestrator
///
/// Cheap to clone; fan-out moves a clone into its background task.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<ArtifactStore>,
    progress: Arc<ProgressRegistry>,
    queue: QueueAdapter,
    parser: Arc<dyn DocumentParser>,
    pdf_page_batch_size: u32,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ArtifactStore>,
        progress: Arc<ProgressRegistry>,
        queue: QueueAdapter,
        parser: Arc<dyn DocumentParser>,
        pdf_page_batch_size: u32,
    ) -> Self {
        Self {
            store,
            progress,
            queue,
            parser,
            pdf_page_batch_size,
        }
    }

    /// Handle one command; the ack token is consumed on every path that
    /// finishes the message
    pub async fn handle(&self, cmd: Command, ack: AckToken) -> Result<Outcome, PipelineError> {
        if let Err(e) = cmd.validate() {
            tracing::warn!(error = %e, command = ?cmd, "Dropping invalid command");
            ack.ack().await?;
            return Ok(Outcome::Completed);
        }

        tracing::info!(
            command = %cmd.command,
            document_id = %cmd.document_id,
            s3_key = %cmd.s3_key,
            part = ?cmd.part,
            "Processing command"
        );

        let kind = cmd.kind();
        let result = match kind {
            CommandKind::ParseFull => self.handle_parse_full(&cmd, ack).await,
            CommandKind::ParsePart => self.handle_parse_part(&cmd, ack).await,
            CommandKind::Split => self.handle_split(&cmd, ack).await,
            CommandKind::Unknown => {
                tracing::warn!(command = %cmd.command, "Unknown command type");
                ack.ack().await?;
                return Ok(Outcome::Completed);
            }
        };

        if let Err(e) = &result {
            if !matches!(e, PipelineError::Cancelled) {
                self.report_failure(&cmd, kind, e).await;
            }
        }

        result
    }

    /// Surface a flow failure on the status channel; the message itself is
    /// left unacked so the queue redelivers it
    async fn report_failure(&self, cmd: &Command, kind: CommandKind, error: &PipelineError) {
        tracing::error!(
            error = %error,
            document_id = %cmd.document_id,
            s3_key = %cmd.s3_key,
            "Command processing failed; message will be redelivered"
        );

        let root = match kind {
            CommandKind::ParsePart => cmd.parent_s3_key.as_deref().unwrap_or(&cmd.s3_key),
            _ => &cmd.s3_key,
        };
        let keys = DocumentKeys::new(root);
        let progress_key = match kind {
            CommandKind::Split => keys.chunking_progress(),
            _ => keys.parsing_progress(),
        };

        if let Err(publish_err) = self
            .progress
            .set_progress(
                &progress_key,
                0.0,
                &cmd.document_id,
                DocumentStatus::Error,
                Some(&error.to_string()),
            )
            .await
        {
            tracing::warn!(error = %publish_err, "Failed to publish error status");
        }
    }
}
