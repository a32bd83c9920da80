//! Stand-in parse engine
//!
//! Extracts per-page text from PDFs (and treats plain text/markdown as a
//! single page) into the raw parser-output model. The pipeline treats this
//! as a black box behind the worker protocol: a richer engine can replace it
//! without touching the pool or the orchestrator.

use std::path::Path;

use lopdf::Document;
use thiserror::Error;

use crate::domain::batch::build_pdf;
use crate::domain::raw::{
    RawDocument, RawOrigin, RawProv, RawRef, RawText,
};

/// Errors from the parse engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Document produced no readable content")]
    EmptyDocument,
}

/// Stand-in parse engine
pub struct ParseEngine;

impl ParseEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parse a tiny generated document to surface environment problems at
    /// startup instead of on the first real parse
    pub fn warmup(&self) -> Result<(), EngineError> {
        let pdf = build_pdf(&["Warmup document"]);
        let doc = Document::load_mem(&pdf)?;
        let _ = doc.extract_text(&[1])?;
        Ok(())
    }

    /// Parse a document file into the raw parser-output model
    pub fn parse_file(&self, path: &Path) -> Result<RawDocument, EngineError> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if bytes.starts_with(b"%PDF") {
            self.parse_pdf(&bytes, filename)
        } else {
            self.parse_text(&bytes, filename)
        }
    }

    fn parse_pdf(&self, bytes: &[u8], filename: String) -> Result<RawDocument, EngineError> {
        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(EngineError::EmptyDocument);
        }

        let mut raw = RawDocument {
            origin: RawOrigin { filename },
            ..Default::default()
        };

        for page_no in pages.keys() {
            raw.pages
                .insert(page_no.to_string(), serde_json::json!({}));

            let page_text = match doc.extract_text(&[*page_no]) {
                Ok(text) => text,
                Err(e) => {
                    // One unreadable page doesn't fail the document
                    tracing::warn!(page = page_no, error = %e, "Failed to extract page text");
                    continue;
                }
            };

            for paragraph in split_paragraphs(&page_text) {
                push_text(&mut raw, paragraph, *page_no);
            }
        }

        Ok(raw)
    }

    fn parse_text(&self, bytes: &[u8], filename: String) -> Result<RawDocument, EngineError> {
        let text = String::from_utf8_lossy(bytes);

        let mut raw = RawDocument {
            origin: RawOrigin { filename },
            ..Default::default()
        };
        raw.pages.insert("1".to_string(), serde_json::json!({}));

        for paragraph in split_paragraphs(&text) {
            push_text(&mut raw, paragraph, 1);
        }

        if raw.texts.is_empty() {
            return Err(EngineError::EmptyDocument);
        }

        Ok(raw)
    }
}

impl Default for ParseEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Split extracted text into trimmed, non-empty paragraphs
fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .flat_map(|block| block.split('\n'))
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// Append a text item to the document and reference it from the body
fn push_text(raw: &mut RawDocument, text: String, page_no: u32) {
    let index = raw.texts.len();
    let label = if text.starts_with('#') {
        "section_header"
    } else {
        "paragraph"
    };
    raw.texts.push(RawText {
        self_ref: format!("#/texts/{}", index),
        label: label.to_string(),
        text: text.trim_start_matches('#').trim_start().to_string(),
        orig: None,
        prov: vec![RawProv {
            page_no,
            bbox: None,
        }],
        children: Vec::new(),
        enumerated: None,
        marker: None,
    });
    raw.body.children.push(RawRef::texts(index));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_warmup() {
        ParseEngine::new().warmup().unwrap();
    }

    #[test]
    fn test_parse_pdf_pages() {
        let pdf = build_pdf(&["First page text", "Second page text"]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&pdf).unwrap();

        let raw = ParseEngine::new().parse_file(file.path()).unwrap();
        assert_eq!(raw.pages.len(), 2);
        assert_eq!(raw.texts.len(), 2);
        assert_eq!(raw.texts[0].prov[0].page_no, 1);
        assert_eq!(raw.texts[1].prov[0].page_no, 2);
        assert!(raw.texts[0].text.contains("First page"));
        assert_eq!(raw.body.children.len(), 2);
    }

    #[test]
    fn test_parse_plain_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"# Heading\n\nBody paragraph.").unwrap();

        let raw = ParseEngine::new().parse_file(file.path()).unwrap();
        assert_eq!(raw.pages.len(), 1);
        assert_eq!(raw.texts[0].label, "section_header");
        assert_eq!(raw.texts[0].text, "Heading");
        assert_eq!(raw.texts[1].label, "paragraph");
    }

    #[test]
    fn test_parse_empty_text_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = ParseEngine::new().parse_file(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::EmptyDocument));
    }

    #[test]
    fn test_split_paragraphs() {
        let paragraphs = split_paragraphs("a\n\nb\nc\n\n  \n");
        assert_eq!(paragraphs, vec!["a", "b", "c"]);
    }
}
