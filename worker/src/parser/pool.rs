//! Parser worker pool
//!
//! A fixed set of child processes behind an idle FIFO. Parse calls block
//! until a worker frees up, which is also the pipeline's back-pressure:
//! pollers cannot out-run the pool. Workers are recycled after a task quota
//! or on any infrastructure failure, and a replacement is spawned before the
//! next dispatch can acquire it.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};

use super::error::ParserError;
use super::worker::{WorkerHandle, WorkerLauncher};

/// Seam between the orchestrator and the pool
///
/// The pool is the production implementation; tests substitute stubs.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse `input` and write raw parser output JSON to `output`
    async fn parse(&self, input: &Path, output: &Path) -> Result<(), ParserError>;
}

struct PoolInner {
    launcher: WorkerLauncher,
    restart_after: u32,
    idle_tx: mpsc::Sender<WorkerHandle>,
    idle_rx: Mutex<mpsc::Receiver<WorkerHandle>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Pool of parser worker processes
#[derive(Clone)]
pub struct ParserPool {
    inner: Arc<PoolInner>,
}

impl ParserPool {
    /// Spawn `num_workers` children and wait for each to become ready
    pub async fn start(
        launcher: WorkerLauncher,
        num_workers: u32,
        restart_after: u32,
    ) -> Result<Self, ParserError> {
        let capacity = num_workers.max(1) as usize;
        let (idle_tx, idle_rx) = mpsc::channel(capacity);
        let (shutdown_tx, _) = watch::channel(false);

        tracing::info!(num_workers, restart_after, "Starting parser worker pool");

        let pool = Self {
            inner: Arc::new(PoolInner {
                launcher,
                restart_after,
                idle_tx,
                idle_rx: Mutex::new(idle_rx),
                shutdown_tx,
            }),
        };

        for worker_id in 0..num_workers.max(1) {
            let worker = WorkerHandle::spawn(&pool.inner.launcher, worker_id).await?;
            pool.inner
                .idle_tx
                .send(worker)
                .await
                .map_err(|_| ParserError::Cancelled)?;
        }

        Ok(pool)
    }

    pub fn is_running(&self) -> bool {
        !*self.inner.shutdown_tx.borrow()
    }

    /// Acquire an idle worker, waiting behind other callers
    async fn acquire(&self) -> Result<WorkerHandle, ParserError> {
        if !self.is_running() {
            return Err(ParserError::Cancelled);
        }

        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let mut idle_rx = self.inner.idle_rx.lock().await;

        tokio::select! {
            _ = shutdown_rx.wait_for(|stopped| *stopped) => Err(ParserError::Cancelled),
            worker = idle_rx.recv() => worker.ok_or(ParserError::Cancelled),
        }
    }

    /// Return a worker to the pool, recycling it when due
    async fn release(
        &self,
        worker: WorkerHandle,
        infra_error: bool,
    ) -> Result<(), ParserError> {
        if !self.is_running() {
            worker.stop().await;
            return Ok(());
        }

        let quota_reached =
            self.inner.restart_after > 0 && worker.tasks_completed >= self.inner.restart_after;

        if !(infra_error || quota_reached) {
            if self.inner.idle_tx.send(worker).await.is_err() {
                // Pool drained concurrently; nothing left to return to
                return Ok(());
            }
            return Ok(());
        }

        let worker_id = worker.id;
        tracing::info!(
            worker_id,
            tasks_completed = worker.tasks_completed,
            infra_error,
            "Recycling parser worker"
        );
        worker.stop().await;

        // Replacement must be live before the next dispatch can acquire it
        let replacement = WorkerHandle::spawn(&self.inner.launcher, worker_id).await?;
        if self.inner.idle_tx.send(replacement).await.is_err() {
            return Ok(());
        }
        Ok(())
    }

    /// Stop all workers; queued parse calls fail with a cancellation error
    pub async fn shutdown(&self) {
        if !self.is_running() {
            return;
        }
        let _ = self.inner.shutdown_tx.send(true);

        tracing::info!("Stopping parser worker pool");

        let mut idle_rx = self.inner.idle_rx.lock().await;
        idle_rx.close();
        while let Ok(worker) = idle_rx.try_recv() {
            worker.stop().await;
        }
    }
}

#[async_trait]
impl DocumentParser for ParserPool {
    async fn parse(&self, input: &Path, output: &Path) -> Result<(), ParserError> {
        let mut worker = self.acquire().await?;

        let result = worker.dispatch(input, output).await;
        let infra_error = matches!(&result, Err(e) if !e.is_task_error());

        let release_result = self.release(worker, infra_error).await;

        match (result, release_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
        }
    }
}
