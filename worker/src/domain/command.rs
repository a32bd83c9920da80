//! Queue command payloads
//!
//! Commands travel as JSON on the processing and indexing queues. The wire
//! field names (`documentId`, `s3key`, `parentS3Key`, `partsCount`) are fixed
//! by the upstream producers and consumers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CMD_PARSE_DOCUMENT: &str = "parse_document";
pub const CMD_SPLIT_DOCUMENT: &str = "split_document";
pub const CMD_INDEX_DOCUMENT: &str = "index_document";

/// A pipeline command as carried on a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Command type: parse_document | split_document | index_document
    #[serde(default)]
    pub command: String,

    #[serde(rename = "documentId", default)]
    pub document_id: String,

    /// Object key of the document; root for all derived artifact keys
    #[serde(rename = "s3key", default)]
    pub s3_key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,

    /// Root key of the parent document, set on fan-out part commands
    #[serde(rename = "parentS3Key", skip_serializing_if = "Option::is_none")]
    pub parent_s3_key: Option<String>,

    /// 0-based batch index, set on fan-out part commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<u32>,

    /// Total number of batches, set on fan-out part commands
    #[serde(rename = "partsCount", skip_serializing_if = "Option::is_none")]
    pub parts_count: Option<u32>,
}

/// Routing decision for a validated command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    ParseFull,
    ParsePart,
    Split,
    Unknown,
}

/// Command payload rejections (logged and acked, never retried)
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Missing required command fields: command, documentId, s3key")]
    MissingFields,

    #[error("Invalid fan-out fields: part={part:?} partsCount={parts_count:?} parentS3Key={parent:?}")]
    InvalidFanOut {
        part: Option<u32>,
        parts_count: Option<u32>,
        parent: Option<String>,
    },
}

impl Command {
    pub fn parse_document(document_id: &str, s3_key: &str) -> Self {
        Self {
            command: CMD_PARSE_DOCUMENT.to_string(),
            document_id: document_id.to_string(),
            s3_key: s3_key.to_string(),
            mime: None,
            parent_s3_key: None,
            part: None,
            parts_count: None,
        }
    }

    /// Fan-out command for one PDF batch
    pub fn parse_part(
        document_id: &str,
        batch_key: &str,
        mime: &str,
        parent_s3_key: &str,
        part: u32,
        parts_count: u32,
    ) -> Self {
        Self {
            command: CMD_PARSE_DOCUMENT.to_string(),
            document_id: document_id.to_string(),
            s3_key: batch_key.to_string(),
            mime: Some(mime.to_string()),
            parent_s3_key: Some(parent_s3_key.to_string()),
            part: Some(part),
            parts_count: Some(parts_count),
        }
    }

    pub fn split_document(document_id: &str, s3_key: &str) -> Self {
        Self {
            command: CMD_SPLIT_DOCUMENT.to_string(),
            document_id: document_id.to_string(),
            s3_key: s3_key.to_string(),
            mime: None,
            parent_s3_key: None,
            part: None,
            parts_count: None,
        }
    }

    pub fn index_document(document_id: &str, s3_key: &str) -> Self {
        Self {
            command: CMD_INDEX_DOCUMENT.to_string(),
            document_id: document_id.to_string(),
            s3_key: s3_key.to_string(),
            mime: None,
            parent_s3_key: None,
            part: None,
            parts_count: None,
        }
    }

    /// Validate required fields and the fan-out invariant
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.command.is_empty() || self.document_id.is_empty() || self.s3_key.is_empty() {
            return Err(CommandError::MissingFields);
        }

        if self.parts_count.is_some_and(|n| n > 1) {
            let parts_count = self.parts_count.unwrap_or(0);
            let valid = self.parent_s3_key.as_ref().is_some_and(|p| !p.is_empty())
                && self.part.is_some_and(|i| i < parts_count);
            if !valid {
                return Err(CommandError::InvalidFanOut {
                    part: self.part,
                    parts_count: self.parts_count,
                    parent: self.parent_s3_key.clone(),
                });
            }
        }

        Ok(())
    }

    /// Classify a validated command for dispatch
    pub fn kind(&self) -> CommandKind {
        match self.command.as_str() {
            CMD_PARSE_DOCUMENT => {
                if self.parts_count.is_some_and(|n| n > 1) {
                    CommandKind::ParsePart
                } else {
                    CommandKind::ParseFull
                }
            }
            CMD_SPLIT_DOCUMENT => CommandKind::Split,
            _ => CommandKind::Unknown,
        }
    }
}
