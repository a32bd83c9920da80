//! Parser worker pool error types

use thiserror::Error;

/// Errors from parse dispatch and worker lifecycle
#[derive(Error, Debug)]
pub enum ParserError {
    /// The worker completed the task but the parse itself failed. The worker
    /// stays healthy; the document is the problem.
    #[error("Parse failed: {0}")]
    Task(String),

    /// The worker process failed: broken pipe, unexpected exit, protocol
    /// violation. The worker is recycled.
    #[error("Worker pool error: {0}")]
    Worker(String),

    /// The pool was shut down while the call was queued or in flight
    #[error("Parse cancelled by shutdown")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParserError {
    /// Clean task failures do not trigger worker recycling
    pub fn is_task_error(&self) -> bool {
        matches!(self, ParserError::Task(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_classification() {
        assert!(ParserError::Task("bad pdf".into()).is_task_error());
        assert!(!ParserError::Worker("gone".into()).is_task_error());
        assert!(!ParserError::Cancelled.is_task_error());
    }
}
