//! PDF batching for fan-out
//!
//! Splits a PDF into consecutive page batches, each emitted as a standalone
//! valid PDF. Batch i of size S covers pages [i*S, min((i+1)*S, P)) in the
//! original 0-based numbering; page order is preserved and batches never
//! overlap. Documents at or below the batch size are left alone.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use thiserror::Error;

/// Errors from PDF inspection and splitting
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF has no pages")]
    EmptyDocument,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a batching attempt
#[derive(Debug)]
pub enum BatchOutcome {
    /// Document fits in a single batch; parse it as-is
    NotBatched,
    /// Per-batch PDF byte streams, in page order
    Batched(Vec<Vec<u8>>),
}

/// Number of pages in a PDF byte stream
pub fn page_count(bytes: &[u8]) -> Result<u32, BatchError> {
    let doc = Document::load_mem(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Split a PDF into page batches of at most `batch_size` pages
///
/// CPU-bound; callers on the async runtime should wrap this in
/// `spawn_blocking`.
pub fn split_pdf(bytes: &[u8], batch_size: u32) -> Result<BatchOutcome, BatchError> {
    let batch_size = batch_size.max(1);
    let source = Document::load_mem(bytes)?;

    let total_pages = source.get_pages().len() as u32;
    if total_pages == 0 {
        return Err(BatchError::EmptyDocument);
    }
    if total_pages <= batch_size {
        return Ok(BatchOutcome::NotBatched);
    }

    let batch_count = total_pages.div_ceil(batch_size);
    let mut batches = Vec::with_capacity(batch_count as usize);

    for batch_index in 0..batch_count {
        let first = batch_index * batch_size + 1;
        let last = ((batch_index + 1) * batch_size).min(total_pages);

        let mut batch_doc = source.clone();
        let delete: Vec<u32> = (1..=total_pages)
            .filter(|page| *page < first || *page > last)
            .collect();
        batch_doc.delete_pages(&delete);
        batch_doc.prune_objects();

        let mut buffer = Vec::new();
        batch_doc.save_to(&mut buffer)?;
        batches.push(buffer);
    }

    tracing::debug!(
        total_pages,
        batch_size,
        batches = batches.len(),
        "PDF split into batches"
    );

    Ok(BatchOutcome::Batched(batches))
}

/// Build a simple PDF with one page per text
///
/// Used for the engine warmup document and as a fixture builder in tests.
pub fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(page_texts.len());
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("serialize generated PDF");
    buffer
}
