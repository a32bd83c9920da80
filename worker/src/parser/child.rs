//! Parser worker child process
//!
//! Runs inside the `docflow parser-worker` subprocess: initializes the
//! engine, performs a warmup parse, signals readiness, then serves parse
//! commands from stdin until shutdown or EOF. All output on stdout is
//! protocol traffic; diagnostics travel as `log` events so the parent can
//! fold them into its own log.

use std::io::{BufRead, Write};
use std::path::Path;

use super::engine::ParseEngine;
use super::protocol::{ParseStatus, WorkerCommand, WorkerEvent};

/// Blocking child main loop
///
/// The child is single-purpose and CPU-bound; it deliberately runs without
/// an async runtime.
pub fn run(worker_id: u32) -> std::io::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    emit_log(&mut out, "info", "Worker process bootstrapping")?;

    let engine = ParseEngine::new();
    if let Err(e) = engine.warmup() {
        emit(
            &mut out,
            &WorkerEvent::Result {
                status: ParseStatus::Error,
                error: Some(format!("Engine warmup failed: {}", e)),
                output_path: None,
            },
        )?;
        return Err(std::io::Error::other(format!("warmup failed: {}", e)));
    }

    emit(&mut out, &WorkerEvent::Ready { worker_id })?;

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match serde_json::from_str::<WorkerCommand>(&line) {
            Ok(command) => command,
            Err(e) => {
                emit_log(
                    &mut out,
                    "warn",
                    &format!("Ignoring malformed command: {}", e),
                )?;
                continue;
            }
        };

        match command {
            WorkerCommand::Shutdown => {
                emit_log(&mut out, "info", "Shutdown command received")?;
                break;
            }
            WorkerCommand::Parse {
                input_path,
                output_path,
            } => {
                emit_log(
                    &mut out,
                    "info",
                    &format!("Parsing {}", input_path.display()),
                )?;
                let event = handle_parse(&engine, &input_path, &output_path);
                emit(&mut out, &event)?;
            }
        }
    }

    Ok(())
}

/// Parse one document and write the raw output JSON before reporting success
fn handle_parse(engine: &ParseEngine, input_path: &Path, output_path: &Path) -> WorkerEvent {
    let raw = match engine.parse_file(input_path) {
        Ok(raw) => raw,
        Err(e) => {
            return WorkerEvent::Result {
                status: ParseStatus::Error,
                error: Some(e.to_string()),
                output_path: None,
            };
        }
    };

    let json = match serde_json::to_vec_pretty(&raw) {
        Ok(json) => json,
        Err(e) => {
            return WorkerEvent::Result {
                status: ParseStatus::Error,
                error: Some(format!("Failed to serialize parser output: {}", e)),
                output_path: None,
            };
        }
    };

    if let Err(e) = std::fs::write(output_path, json) {
        return WorkerEvent::Result {
            status: ParseStatus::Error,
            error: Some(format!(
                "Failed to write parser output to {}: {}",
                output_path.display(),
                e
            )),
            output_path: None,
        };
    }

    WorkerEvent::Result {
        status: ParseStatus::Success,
        error: None,
        output_path: Some(output_path.to_path_buf()),
    }
}

fn emit(out: &mut impl Write, event: &WorkerEvent) -> std::io::Result<()> {
    let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
    writeln!(out, "{}", line)?;
    out.flush()
}

fn emit_log(out: &mut impl Write, level: &str, message: &str) -> std::io::Result<()> {
    emit(
        out,
        &WorkerEvent::Log {
            level: level.to_string(),
            message: message.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::build_pdf;
    use crate::domain::raw::RawDocument;

    #[test]
    fn test_handle_parse_writes_output() {
        let engine = ParseEngine::new();
        let mut input = tempfile::NamedTempFile::new().unwrap();
        input.write_all(&build_pdf(&["Hello"])).unwrap();
        let output = tempfile::NamedTempFile::new().unwrap();

        let event = handle_parse(&engine, input.path(), output.path());
        assert!(matches!(
            event,
            WorkerEvent::Result {
                status: ParseStatus::Success,
                ..
            }
        ));

        let raw: RawDocument =
            serde_json::from_slice(&std::fs::read(output.path()).unwrap()).unwrap();
        assert_eq!(raw.pages.len(), 1);
    }

    #[test]
    fn test_handle_parse_missing_input() {
        let engine = ParseEngine::new();
        let output = tempfile::NamedTempFile::new().unwrap();
        let event = handle_parse(&engine, Path::new("/nonexistent/input.pdf"), output.path());
        match event {
            WorkerEvent::Result { status, error, .. } => {
                assert_eq!(status, ParseStatus::Error);
                assert!(error.is_some());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
