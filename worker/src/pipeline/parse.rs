//! Parse flows: single-document parse, fan-out, parse-part, fan-in
//!
//! Large PDFs are split into page batches persisted as `K.part{i}` objects,
//! each driven by its own `parse_document` message. The last part to finish
//! (by listing, not by counter) merges the partial reports into the
//! canonical `K.parsed.json` and hands the document to the split stage.

use std::time::Duration;

use crate::core::constants::REQUEUE_DELAY_SECS;
use crate::data::progress::DocumentStatus;
use crate::data::queue::{AckToken, QueueTarget};
use crate::domain::batch::{BatchOutcome, split_pdf};
use crate::domain::command::Command;
use crate::domain::keys::{DocumentKeys, is_parsed_part_key};
use crate::domain::raw::RawDocument;
use crate::domain::report::{ProcessedReport, ReportAssembler, merge_reports};
use crate::domain::text::render_markdown;
use crate::parser::ParserError;
use crate::utils::retry::retry_with_backoff_async;

use super::{Orchestrator, Outcome, PipelineError};

const PDF_MIME: &str = "application/pdf";
const JSON_MIME: &str = "application/json";
const MARKDOWN_MIME: &str = "text/markdown";
const FALLBACK_MIME: &str = "application/octet-stream";

/// Terminal message when parts are lost without parsed results
const PARTS_LOST_ERROR: &str = "failed to parse document parts";

impl Orchestrator {
    /// Parse an unpartitioned document, or fan a large PDF out into batches
    pub(super) async fn handle_parse_full(
        &self,
        cmd: &Command,
        ack: AckToken,
    ) -> Result<Outcome, PipelineError> {
        let keys = DocumentKeys::new(&cmd.s3_key);
        let parsing_key = keys.parsing_progress();

        // Completed earlier: forward to the next stage and stop
        if self.store.exists(&keys.parsed_json()).await? {
            tracing::info!(
                document_id = %cmd.document_id,
                "Document already parsed, skipping to split"
            );
            self.send_split(cmd).await?;
            self.progress
                .set_progress(&parsing_key, 1.0, &cmd.document_id, DocumentStatus::Parsing, None)
                .await?;
            ack.ack().await?;
            return Ok(Outcome::Completed);
        }

        // Another worker holds the stage: back off past the progress TTL
        if let Some(p) = self.progress.get(&parsing_key).await? {
            if p <= 1.0 {
                tracing::info!(
                    document_id = %cmd.document_id,
                    progress = p,
                    "Document parsing in progress, delaying"
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
        }

        self.progress
            .set_progress(&parsing_key, 0.0, &cmd.document_id, DocumentStatus::Parsing, None)
            .await?;

        let content = self.store.get_bytes(&cmd.s3_key).await?;
        let mime = cmd
            .mime
            .clone()
            .or(content.content_type.clone())
            .or_else(|| {
                mime_guess::from_path(&cmd.s3_key)
                    .first_raw()
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        if mime == PDF_MIME {
            let batch_size = self.pdf_page_batch_size;
            let bytes = content.data.clone();
            let outcome = tokio::task::spawn_blocking(move || split_pdf(&bytes, batch_size))
                .await
                .map_err(|e| PipelineError::Internal(e.to_string()))?;

            match outcome {
                Ok(BatchOutcome::Batched(batches)) => {
                    // Ack moves into the background task; it is only invoked
                    // after every batch is persisted and enqueued
                    let orchestrator = self.clone();
                    let cmd = cmd.clone();
                    let mime = mime.clone();
                    let handle = tokio::spawn(async move {
                        let keys = DocumentKeys::new(&cmd.s3_key);
                        if let Err(e) =
                            orchestrator.run_fan_out(&cmd, &keys, &mime, batches, ack).await
                        {
                            tracing::error!(
                                error = %e,
                                document_id = %cmd.document_id,
                                "Fan-out failed; parse command will be redelivered"
                            );
                        }
                    });
                    return Ok(Outcome::Background(handle));
                }
                Ok(BatchOutcome::NotBatched) => {}
                Err(e) => {
                    // Unreadable PDF: terminal for the document
                    return self
                        .terminal_parse_error(cmd, &parsing_key, &e.to_string(), None, ack)
                        .await;
                }
            }
        }

        self.progress
            .set_progress(&parsing_key, 0.3, &cmd.document_id, DocumentStatus::Parsing, None)
            .await?;

        let raw_json = match self.dispatch_parse(content.data).await? {
            Ok(raw_json) => raw_json,
            Err(task_error) => {
                return self
                    .terminal_parse_error(cmd, &parsing_key, &task_error, None, ack)
                    .await;
            }
        };

        self.progress
            .set_progress(&parsing_key, 0.6, &cmd.document_id, DocumentStatus::Parsing, None)
            .await?;

        let report = match Self::assemble_report(raw_json).await? {
            Ok(report) => report,
            Err(task_error) => {
                return self
                    .terminal_parse_error(cmd, &parsing_key, &task_error, None, ack)
                    .await;
            }
        };

        self.progress
            .set_progress(&parsing_key, 0.8, &cmd.document_id, DocumentStatus::Parsing, None)
            .await?;

        self.write_report_artifacts(&keys, report).await?;

        self.progress
            .set_progress(&parsing_key, 1.0, &cmd.document_id, DocumentStatus::Parsing, None)
            .await?;
        self.send_split(cmd).await?;
        ack.ack().await?;

        tracing::info!(document_id = %cmd.document_id, "Successfully parsed document");
        Ok(Outcome::Completed)
    }

    /// Persist every batch, enqueue its part command, then ack the original
    /// message. Any failure leaves the message unacked for redelivery; batch
    /// writes are idempotent so the retry re-covers a partial fan-out.
    async fn run_fan_out(
        &self,
        cmd: &Command,
        keys: &DocumentKeys,
        mime: &str,
        batches: Vec<Vec<u8>>,
        ack: AckToken,
    ) -> Result<(), PipelineError> {
        let total = batches.len() as u32;

        for (index, bytes) in batches.into_iter().enumerate() {
            let index = index as u32;
            let part_key = keys.part(index);
            self.store.put(&part_key, bytes, mime).await?;

            let part_cmd =
                Command::parse_part(&cmd.document_id, &part_key, mime, keys.root(), index, total);
            retry_with_backoff_async(3, 100, || {
                let queue = self.queue.clone();
                let part_cmd = part_cmd.clone();
                async move {
                    queue
                        .send_json(QueueTarget::Processing, &part_cmd, Duration::ZERO)
                        .await
                }
            })
            .await
            .map_err(|(e, _)| e)?;
        }

        self.progress
            .set_progress(
                &keys.parsing_progress(),
                0.0,
                &cmd.document_id,
                DocumentStatus::Parsing,
                Some(&format!("queued {} parts", total)),
            )
            .await?;

        ack.ack().await?;

        tracing::info!(
            document_id = %cmd.document_id,
            parts = total,
            "Document fanned out into part commands"
        );
        Ok(())
    }

    /// Parse one fan-out batch and run the fan-in check
    pub(super) async fn handle_parse_part(
        &self,
        cmd: &Command,
        ack: AckToken,
    ) -> Result<Outcome, PipelineError> {
        // Validation guarantees these on the parse-part route
        let parent = cmd.parent_s3_key.as_deref().unwrap_or_default();
        let parts_count = cmd.parts_count.unwrap_or(1);
        let keys = DocumentKeys::new(parent);
        let parsing_key = keys.parsing_progress();

        // Parent already assembled: the finalize below only forwards
        if self.store.exists(&keys.parsed_json()).await? {
            tracing::info!(
                document_id = %cmd.document_id,
                part = ?cmd.part,
                "Parent document already parsed, skipping part"
            );
            self.finalize_fan_in(&cmd.document_id, &keys, parts_count).await?;
            ack.ack().await?;
            return Ok(Outcome::Completed);
        }

        // UI-only counter; the fan-in gate is the artifact listing
        let completed_parts = self.progress.incr(&keys.parts_progress()).await?;
        if completed_parts >= 1 && (completed_parts as u32) < parts_count {
            let current = self.progress.get(&parsing_key).await?.unwrap_or(0.0);
            let fraction = completed_parts as f64 / parts_count as f64;
            self.progress
                .set_progress(
                    &parsing_key,
                    fraction.max(current),
                    &cmd.document_id,
                    DocumentStatus::Parsing,
                    None,
                )
                .await?;
        }

        let content = self.store.get_bytes(&cmd.s3_key).await?;
        let raw_json = match self.dispatch_parse(content.data).await? {
            Ok(raw_json) => raw_json,
            Err(task_error) => {
                // Failed batches are terminal; drop the batch bytes so the
                // fan-in check can distinguish "lost" from "in flight"
                return self
                    .terminal_parse_error(cmd, &parsing_key, &task_error, Some(&cmd.s3_key), ack)
                    .await;
            }
        };

        let report = match Self::assemble_report(raw_json).await? {
            Ok(report) => report,
            Err(task_error) => {
                return self
                    .terminal_parse_error(cmd, &parsing_key, &task_error, Some(&cmd.s3_key), ack)
                    .await;
            }
        };

        let part_json =
            tokio::task::spawn_blocking(move || serde_json::to_string_pretty(&report))
                .await
                .map_err(|e| PipelineError::Internal(e.to_string()))?
                .map_err(|e| {
                    PipelineError::Internal(format!("Failed to serialize partial report: {}", e))
                })?;

        let partial_key = DocumentKeys::new(&cmd.s3_key).parsed_json();
        self.store
            .put_text(&partial_key, part_json, JSON_MIME)
            .await?;
        self.store.delete(&cmd.s3_key).await?;

        let finalized = self.finalize_fan_in(&cmd.document_id, &keys, parts_count).await?;
        tracing::info!(
            document_id = %cmd.document_id,
            part = ?cmd.part,
            parsed_parts = finalized,
            parts_count,
            "Part parsed"
        );

        ack.ack().await?;
        Ok(Outcome::Completed)
    }

    /// Merge partial reports once all of them exist
    ///
    /// Returns the number of parsed parts observed. Idempotent: when the
    /// canonical report already exists it only re-forwards the split command.
    pub(super) async fn finalize_fan_in(
        &self,
        document_id: &str,
        keys: &DocumentKeys,
        parts_count: u32,
    ) -> Result<u32, PipelineError> {
        let parsing_key = keys.parsing_progress();

        if self.store.exists(&keys.parsed_json()).await? {
            self.send_split(&Command::split_document(document_id, keys.root()))
                .await?;
            self.progress
                .set_progress(&parsing_key, 1.0, document_id, DocumentStatus::Parsing, None)
                .await?;
            return Ok(parts_count);
        }

        let parsed_parts = self
            .store
            .list_by_prefix(&keys.part_prefix(), is_parsed_part_key)
            .await?;

        if (parsed_parts.len() as u32) < parts_count {
            let raw_parts = self
                .store
                .list_by_prefix(&keys.part_prefix(), |k| !is_parsed_part_key(k))
                .await?;

            if raw_parts.is_empty() {
                // No partial reports to come: some parts failed terminally
                tracing::error!(
                    document_id,
                    parsed = parsed_parts.len(),
                    parts_count,
                    "Fan-in cannot complete; parts are missing"
                );
                self.progress
                    .set_progress(
                        &parsing_key,
                        0.0,
                        document_id,
                        DocumentStatus::Error,
                        Some(PARTS_LOST_ERROR),
                    )
                    .await?;
            }
            return Ok(parsed_parts.len() as u32);
        }

        // All parts present: load in index order and merge
        let mut partials = Vec::with_capacity(parts_count as usize);
        for index in 0..parts_count {
            let text = self.store.get_text(&keys.part_parsed_json(index)).await?;
            let report: ProcessedReport = serde_json::from_str(&text).map_err(|e| {
                PipelineError::Internal(format!("Invalid partial report for part {}: {}", index, e))
            })?;
            partials.push(report);
        }

        let merged = tokio::task::spawn_blocking(move || merge_reports(partials))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        self.write_report_artifacts(keys, merged).await?;

        self.progress
            .set_progress(&parsing_key, 1.0, document_id, DocumentStatus::Parsing, None)
            .await?;

        for index in 0..parts_count {
            self.store.delete(&keys.part_parsed_json(index)).await?;
        }

        self.send_split(&Command::split_document(document_id, keys.root()))
            .await?;

        tracing::info!(document_id, parts_count, "Fan-in complete");
        Ok(parts_count)
    }

    /// Run one parse in the worker pool via scratch files
    ///
    /// `Ok(Err(msg))` is a terminal parse failure; `Err(_)` aborts the flow
    /// for redelivery.
    async fn dispatch_parse(
        &self,
        data: Vec<u8>,
    ) -> Result<Result<Vec<u8>, String>, PipelineError> {
        let scratch = std::env::temp_dir();
        let token = uuid::Uuid::new_v4().simple().to_string();
        let input_path = scratch.join(format!("docflow-{}.src", token));
        let output_path = scratch.join(format!("docflow-{}.json", token));

        tokio::fs::write(&input_path, &data).await?;

        let parse_result = self.parser.parse(&input_path, &output_path).await;

        let read_result = match &parse_result {
            Ok(()) => Some(tokio::fs::read(&output_path).await),
            Err(_) => None,
        };

        let _ = tokio::fs::remove_file(&input_path).await;
        let _ = tokio::fs::remove_file(&output_path).await;

        match parse_result {
            Ok(()) => {
                let raw_json = read_result.unwrap_or_else(|| {
                    Err(std::io::Error::other("parser output read skipped"))
                })?;
                Ok(Ok(raw_json))
            }
            Err(ParserError::Cancelled) => Err(PipelineError::Cancelled),
            Err(ParserError::Io(e)) => Err(PipelineError::Io(e)),
            // Clean task failures and worker crashes are both terminal for
            // the document; the pool has already replaced a crashed worker
            Err(e @ (ParserError::Task(_) | ParserError::Worker(_))) => Ok(Err(e.to_string())),
        }
    }

    /// Decode raw parser output and assemble the canonical report
    async fn assemble_report(
        raw_json: Vec<u8>,
    ) -> Result<Result<ProcessedReport, String>, PipelineError> {
        tokio::task::spawn_blocking(move || {
            match serde_json::from_slice::<RawDocument>(&raw_json) {
                Ok(raw) => Ok(ReportAssembler::assemble(&raw)),
                Err(e) => Err(format!("Invalid parser output: {}", e)),
            }
        })
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))
    }

    /// Write `K.parsed.json` and `K.parsed.md`
    async fn write_report_artifacts(
        &self,
        keys: &DocumentKeys,
        report: ProcessedReport,
    ) -> Result<(), PipelineError> {
        let (json, markdown) = tokio::task::spawn_blocking(move || {
            let json = serde_json::to_string_pretty(&report);
            let markdown = render_markdown(&report);
            json.map(|json| (json, markdown))
        })
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))?
        .map_err(|e| PipelineError::Internal(format!("Failed to serialize report: {}", e)))?;

        self.store
            .put_text(&keys.parsed_json(), json, JSON_MIME)
            .await?;
        self.store
            .put_text(&keys.parsed_md(), markdown, MARKDOWN_MIME)
            .await?;
        Ok(())
    }

    /// Record a terminal parse failure and drop the message
    async fn terminal_parse_error(
        &self,
        cmd: &Command,
        parsing_key: &str,
        message: &str,
        delete_key: Option<&str>,
        ack: AckToken,
    ) -> Result<Outcome, PipelineError> {
        tracing::error!(
            document_id = %cmd.document_id,
            s3_key = %cmd.s3_key,
            error = %message,
            "Parse failed terminally"
        );

        if let Some(key) = delete_key {
            self.store.delete(key).await?;
        }

        self.progress
            .set_progress(
                parsing_key,
                0.0,
                &cmd.document_id,
                DocumentStatus::Error,
                Some(message),
            )
            .await?;

        ack.ack().await?;
        Ok(Outcome::Completed)
    }

    async fn send_split(&self, cmd: &Command) -> Result<(), PipelineError> {
        self.queue
            .send_json(
                QueueTarget::Processing,
                &Command::split_document(&cmd.document_id, &cmd.s3_key),
                Duration::ZERO,
            )
            .await?;
        Ok(())
    }
}
