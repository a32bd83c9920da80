//! Worker host: the poller fabric around the orchestrator
//!
//! Runs `num_threads` independent pollers, each pulling at most one message
//! per iteration off the processing queue and dispatching it with its ack
//! token. Pollers stop within one polling round of the shutdown signal;
//! background fan-out tasks are registered with the shutdown service so they
//! drain before the parser pool goes down.

use std::time::Duration;

use tokio::sync::watch;

use crate::core::ShutdownService;
use crate::core::constants::POLL_ERROR_BACKOFF_SECS;
use crate::data::queue::{AckToken, QueueAdapter, ReceivedMessage};
use crate::domain::command::Command;

use super::{Orchestrator, Outcome, PipelineError};

/// The poller fabric
pub struct WorkerHost {
    orchestrator: Orchestrator,
    queue: QueueAdapter,
    shutdown: ShutdownService,
    num_pollers: u32,
}

impl WorkerHost {
    pub fn new(
        orchestrator: Orchestrator,
        queue: QueueAdapter,
        shutdown: ShutdownService,
        num_pollers: u32,
    ) -> Self {
        Self {
            orchestrator,
            queue,
            shutdown,
            num_pollers,
        }
    }

    /// Spawn the pollers and register them with the shutdown service
    pub async fn start(&self) {
        tracing::info!(pollers = self.num_pollers, "Starting queue pollers");

        for poller_id in 0..self.num_pollers {
            let orchestrator = self.orchestrator.clone();
            let queue = self.queue.clone();
            let shutdown = self.shutdown.clone();
            let shutdown_rx = self.shutdown.subscribe();

            let handle = tokio::spawn(async move {
                poller_loop(poller_id, orchestrator, queue, shutdown, shutdown_rx).await;
            });
            self.shutdown.register(handle).await;
        }
    }
}

/// Waits until the shutdown flag becomes true, without holding the watch
/// channel's read guard across an await point (required for the enclosing
/// future to stay `Send`).
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn poller_loop(
    poller_id: u32,
    orchestrator: Orchestrator,
    queue: QueueAdapter,
    shutdown: ShutdownService,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::debug!(poller_id, "Poller started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let mut select_rx = shutdown_rx.clone();
        tokio::select! {
            _ = wait_for_shutdown(&mut select_rx) => break,
            received = queue.receive_command() => match received {
                Ok(None) => continue,
                Ok(Some((message, ack))) => {
                    dispatch(poller_id, &orchestrator, &shutdown, message, ack).await;
                }
                Err(e) => {
                    tracing::error!(poller_id, error = %e, "Queue receive failed");
                    tokio::select! {
                        _ = wait_for_shutdown(&mut shutdown_rx) => break,
                        _ = tokio::time::sleep(Duration::from_secs(POLL_ERROR_BACKOFF_SECS)) => {}
                    }
                }
            }
        }
    }

    tracing::debug!(poller_id, "Poller stopped");
}

async fn dispatch(
    poller_id: u32,
    orchestrator: &Orchestrator,
    shutdown: &ShutdownService,
    message: ReceivedMessage,
    ack: AckToken,
) {
    let cmd: Command = match serde_json::from_str(&message.body) {
        Ok(cmd) => cmd,
        Err(e) => {
            tracing::warn!(
                poller_id,
                error = %e,
                body = %message.body,
                "Dropping message with invalid JSON body"
            );
            if let Err(ack_err) = ack.ack().await {
                tracing::warn!(poller_id, error = %ack_err, "Failed to ack invalid message");
            }
            return;
        }
    };

    match orchestrator.handle(cmd, ack).await {
        Ok(Outcome::Completed) => {}
        Ok(Outcome::Background(handle)) => {
            shutdown.register(handle).await;
        }
        Err(PipelineError::Cancelled) => {
            tracing::debug!(poller_id, "Command cancelled by shutdown; left for redelivery");
        }
        Err(e) => {
            tracing::error!(
                poller_id,
                error = %e,
                "Command processing failed; message left for redelivery"
            );
        }
    }
}
