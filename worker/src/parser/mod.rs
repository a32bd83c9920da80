//! Parser worker pool: isolated child processes hosting the parse engine
//!
//! The engine is memory-heavy and failure-prone on hostile inputs, so each
//! instance lives in its own subprocess. The pool handles dispatch,
//! recycling, and crash recovery; the protocol is newline-delimited JSON
//! over the child's stdio.

pub mod child;
mod engine;
mod error;
mod pool;
mod protocol;
mod worker;

pub use engine::{EngineError, ParseEngine};
pub use error::ParserError;
pub use pool::{DocumentParser, ParserPool};
pub use protocol::{ParseStatus, WorkerCommand, WorkerEvent};
pub use worker::WorkerLauncher;
