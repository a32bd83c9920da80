//! One pooled parser worker process
//!
//! Owns the child process and its stdio protocol streams. Spawning blocks
//! until the child reports `ready`; stopping sends a shutdown command, waits
//! out a grace period, then kills. `kill_on_drop` backstops every path so an
//! abandoned handle never leaks a child process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::core::constants::WORKER_SHUTDOWN_WAIT_SECS;

use super::error::ParserError;
use super::protocol::{ParseStatus, WorkerCommand, WorkerEvent};

/// How a pooled worker child is launched
///
/// Production launches the current executable with the hidden
/// `parser-worker` subcommand; tests substitute scripted stand-ins.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerLauncher {
    /// Launch `docflow parser-worker` from the running binary
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec!["parser-worker".to_string()],
        })
    }

    /// Launch an arbitrary program speaking the worker protocol
    pub fn custom(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, worker_id: u32) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--worker-id")
            .arg(worker_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// A live worker child with its protocol streams
pub(super) struct WorkerHandle {
    pub id: u32,
    pub tasks_completed: u32,
    child: Child,
    stdin: ChildStdin,
    events: Lines<BufReader<ChildStdout>>,
}

impl WorkerHandle {
    /// Spawn a child and wait for its `ready` event
    pub async fn spawn(launcher: &WorkerLauncher, id: u32) -> Result<Self, ParserError> {
        let mut child = launcher
            .command(id)
            .spawn()
            .map_err(|e| ParserError::Worker(format!("Failed to spawn worker {}: {}", id, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ParserError::Worker(format!("Worker {} has no stdin", id)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ParserError::Worker(format!("Worker {} has no stdout", id)))?;

        let mut handle = Self {
            id,
            tasks_completed: 0,
            child,
            stdin,
            events: BufReader::new(stdout).lines(),
        };

        // Consume startup traffic until the child signals readiness
        loop {
            match handle.next_event().await? {
                WorkerEvent::Ready { .. } => break,
                WorkerEvent::Log { level, message } => handle.forward_log(&level, &message),
                WorkerEvent::Result { error, .. } => {
                    let reason = error.unwrap_or_else(|| "unexpected result".to_string());
                    handle.kill().await;
                    return Err(ParserError::Worker(format!(
                        "Worker {} failed during startup: {}",
                        id, reason
                    )));
                }
            }
        }

        tracing::debug!(worker_id = id, "Parser worker ready");
        Ok(handle)
    }

    /// Dispatch one parse command and wait for its result
    pub async fn dispatch(&mut self, input: &Path, output: &Path) -> Result<(), ParserError> {
        let command = WorkerCommand::Parse {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
        };
        self.send(&command).await?;

        loop {
            match self.next_event().await? {
                WorkerEvent::Log { level, message } => self.forward_log(&level, &message),
                // A late ready (e.g. duplicated line) is harmless
                WorkerEvent::Ready { .. } => continue,
                WorkerEvent::Result { status, error, .. } => {
                    self.tasks_completed += 1;
                    return match status {
                        ParseStatus::Success => Ok(()),
                        ParseStatus::Error => Err(ParserError::Task(
                            error.unwrap_or_else(|| "Unknown worker error".to_string()),
                        )),
                    };
                }
            }
        }
    }

    /// Graceful stop: shutdown command, grace period, then kill
    pub async fn stop(mut self) {
        let _ = self.send(&WorkerCommand::Shutdown).await;

        let grace = Duration::from_secs(WORKER_SHUTDOWN_WAIT_SECS);
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(worker_id = self.id, status = %status, "Worker exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(worker_id = self.id, error = %e, "Failed to wait for worker");
            }
            Err(_) => {
                tracing::warn!(
                    worker_id = self.id,
                    "Worker did not exit in time; terminating"
                );
                self.kill().await;
            }
        }
    }

    /// Immediate kill without the shutdown handshake
    pub async fn kill(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }

    async fn send(&mut self, command: &WorkerCommand) -> Result<(), ParserError> {
        let mut line = serde_json::to_string(command)
            .map_err(|e| ParserError::Worker(format!("Failed to encode command: {}", e)))?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await.map_err(|e| {
            ParserError::Worker(format!("Failed to send command to worker {}: {}", self.id, e))
        })?;
        self.stdin.flush().await.map_err(|e| {
            ParserError::Worker(format!("Failed to flush command to worker {}: {}", self.id, e))
        })
    }

    async fn next_event(&mut self) -> Result<WorkerEvent, ParserError> {
        loop {
            let line = self.events.next_line().await.map_err(|e| {
                ParserError::Worker(format!("Worker {} read error: {}", self.id, e))
            })?;
            let Some(line) = line else {
                return Err(ParserError::Worker(format!(
                    "Worker {} disconnected unexpectedly",
                    self.id
                )));
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WorkerEvent>(&line) {
                Ok(event) => return Ok(event),
                Err(e) => {
                    tracing::warn!(
                        worker_id = self.id,
                        error = %e,
                        line = %line,
                        "Ignoring malformed worker event"
                    );
                }
            }
        }
    }

    fn forward_log(&self, level: &str, message: &str) {
        match level.to_lowercase().as_str() {
            "error" => tracing::error!(worker_id = self.id, "{}", message),
            "warn" | "warning" => tracing::warn!(worker_id = self.id, "{}", message),
            "debug" => tracing::debug!(worker_id = self.id, "{}", message),
            "trace" => tracing::trace!(worker_id = self.id, "{}", message),
            _ => tracing::info!(worker_id = self.id, "{}", message),
        }
    }
}
