//! Parser worker IPC protocol
//!
//! Newline-delimited JSON over the child's stdin/stdout. The parent sends
//! commands; the child answers with exactly one `result` per parse, with
//! `log` events interleaved freely and one `ready` after warmup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Parent → child commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum WorkerCommand {
    Parse {
        input_path: PathBuf,
        output_path: PathBuf,
    },
    Shutdown,
}

/// Outcome of one parse command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Success,
    Error,
}

/// Child → parent events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// Sent once after the engine is warmed up
    Ready { worker_id: u32 },

    /// Forwarded into the parent's log, tagged with the worker id
    Log { level: String, message: String },

    /// Terminal answer to a parse command
    Result {
        status: ParseStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd = WorkerCommand::Parse {
            input_path: PathBuf::from("/tmp/in.pdf"),
            output_path: PathBuf::from("/tmp/out.json"),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["cmd"], "parse");
        assert_eq!(json["input_path"], "/tmp/in.pdf");

        let shutdown = serde_json::to_value(WorkerCommand::Shutdown).unwrap();
        assert_eq!(shutdown["cmd"], "shutdown");
    }

    #[test]
    fn test_event_wire_format() {
        let ready: WorkerEvent = serde_json::from_str(r#"{"type":"ready","worker_id":3}"#).unwrap();
        assert!(matches!(ready, WorkerEvent::Ready { worker_id: 3 }));

        let result: WorkerEvent =
            serde_json::from_str(r#"{"type":"result","status":"error","error":"bad xref"}"#)
                .unwrap();
        match result {
            WorkerEvent::Result { status, error, .. } => {
                assert_eq!(status, ParseStatus::Error);
                assert_eq!(error.as_deref(), Some("bad xref"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_success_result_roundtrip() {
        let event = WorkerEvent::Result {
            status: ParseStatus::Success,
            error: None,
            output_path: Some(PathBuf::from("/tmp/out.json")),
        };
        let line = serde_json::to_string(&event).unwrap();
        assert!(!line.contains("error"));
        let parsed: WorkerEvent = serde_json::from_str(&line).unwrap();
        assert!(matches!(
            parsed,
            WorkerEvent::Result {
                status: ParseStatus::Success,
                ..
            }
        ));
    }
}
