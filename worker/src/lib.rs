//! docflow: distributed document-ingestion worker
//!
//! Consumes parse/split commands from the processing queue, stores document
//! artifacts in the object store, parses documents in recyclable child
//! processes, fans large PDFs out into per-batch commands, and publishes
//! best-effort progress over pub/sub.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod parser;
pub mod pipeline;
pub mod utils;
