//! Core application
//!
//! Wires configuration into the typed application context (store, progress
//! registry, queue adapter, parser pool, orchestrator) and runs the poller
//! fabric until shutdown. The hidden `parser-worker` subcommand runs the
//! child process loop instead and never touches the async runtime.

use std::sync::Arc;

use anyhow::Result;

use crate::api;
use crate::core::ShutdownService;
use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::data::progress::ProgressRegistry;
use crate::data::queue::QueueAdapter;
use crate::data::store::ArtifactStore;
use crate::parser::{self, ParserPool, WorkerLauncher};
use crate::pipeline::{Orchestrator, WorkerHost};

pub struct CoreApp {
    pub config: AppConfig,
    pub shutdown: ShutdownService,
    pub store: Arc<ArtifactStore>,
    pub progress: Arc<ProgressRegistry>,
    pub queue: QueueAdapter,
    pub pool: ParserPool,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        let cli_config = cli::parse();

        // The child subcommand speaks protocol JSON on stdout; its logs are
        // forwarded to the parent, so no subscriber is installed here
        if let Some(Commands::ParserWorker { worker_id }) = &cli_config.command {
            let worker_id = *worker_id;
            return tokio::task::spawn_blocking(move || parser::child::run(worker_id))
                .await?
                .map_err(Into::into);
        }

        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let app = Self::init(&cli_config).await?;
        app.start().await
    }

    async fn init(cli: &cli::CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let shutdown = ShutdownService::new();

        let store = Arc::new(
            ArtifactStore::new(&config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize artifact store: {}", e))?,
        );
        tracing::debug!(backend = store.backend_name(), "Artifact store initialized");

        let progress = Arc::new(
            ProgressRegistry::new(&config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize progress registry: {}", e))?,
        );
        tracing::debug!(backend = progress.backend_name(), "Progress registry initialized");

        let queue = QueueAdapter::new(&config)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize queue adapter: {}", e))?;
        tracing::debug!(backend = queue.backend_name(), "Queue adapter initialized");

        let launcher = WorkerLauncher::current_exe()?;
        let pool = ParserPool::start(
            launcher,
            config.pipeline.num_threads,
            config.pipeline.worker_restart_after,
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start parser worker pool: {}", e))?;

        Ok(Self {
            config,
            shutdown,
            store,
            progress,
            queue,
            pool,
        })
    }

    async fn start(self) -> Result<()> {
        self.shutdown.install_signal_handlers();

        let orchestrator = Orchestrator::new(
            self.store.clone(),
            self.progress.clone(),
            self.queue.clone(),
            Arc::new(self.pool.clone()),
            self.config.pipeline.pdf_page_batch_size,
        );

        let host = WorkerHost::new(
            orchestrator,
            self.queue.clone(),
            self.shutdown.clone(),
            self.config.pipeline.num_threads,
        );
        host.start().await;

        tracing::info!(
            num_threads = self.config.pipeline.num_threads,
            "Worker started"
        );

        // Serves until the shutdown signal fires
        api::serve(
            &self.config.server.host,
            self.config.server.port,
            &self.shutdown,
        )
        .await?;

        // Pollers and background fan-out tasks drain before the pool stops,
        // so no parse dispatch can land on a dead pool
        self.shutdown.shutdown().await;
        self.pool.shutdown().await;

        tracing::info!("Shutdown complete");
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}
