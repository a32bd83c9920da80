use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_NUM_THREADS, DEFAULT_PDF_PAGE_BATCH_SIZE, DEFAULT_PORT,
    DEFAULT_REDIS_URL, DEFAULT_STATUS_CHANNEL, DEFAULT_WORKER_RESTART_AFTER, NUM_THREADS_MAX,
    NUM_THREADS_MIN,
};

// =============================================================================
// Backend Enums
// =============================================================================

/// Artifact store backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendType {
    #[default]
    S3,
    Memory,
}

impl fmt::Display for StoreBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackendType::S3 => write!(f, "s3"),
            StoreBackendType::Memory => write!(f, "memory"),
        }
    }
}

/// Progress registry backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBackendType {
    #[default]
    Redis,
    Memory,
}

impl fmt::Display for ProgressBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressBackendType::Redis => write!(f, "redis"),
            ProgressBackendType::Memory => write!(f, "memory"),
        }
    }
}

/// Queue backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendType {
    #[default]
    Sqs,
    Memory,
}

impl fmt::Display for QueueBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueBackendType::Sqs => write!(f, "sqs"),
            QueueBackendType::Memory => write!(f, "memory"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Redis configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RedisFileConfig {
    pub url: Option<String>,
    pub status_channel: Option<String>,
}

/// S3 configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct S3FileConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
}

/// SQS configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SqsFileConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub documents_queue: Option<String>,
    pub index_documents_queue: Option<String>,
}

/// Pipeline tuning section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PipelineFileConfig {
    pub num_threads: Option<u32>,
    pub pdf_page_batch_size: Option<u32>,
    pub worker_restart_after: Option<u32>,
}

/// Backend selection section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BackendsFileConfig {
    pub store: Option<StoreBackendType>,
    pub progress: Option<ProgressBackendType>,
    pub queue: Option<QueueBackendType>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub redis: Option<RedisFileConfig>,
    pub s3: Option<S3FileConfig>,
    pub sqs: Option<SqsFileConfig>,
    pub pipeline: Option<PipelineFileConfig>,
    pub backends: Option<BackendsFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra {
            if !map.is_empty() {
                let keys_str: String = map
                    .keys()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::warn!(
                    fields = %keys_str,
                    "Unknown fields in config file (possible typos)"
                );
            }
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Health endpoint configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Redis configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub status_channel: String,
}

/// S3 configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
}

/// SQS configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct SqsConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub documents_queue: String,
    pub index_documents_queue: String,
}

/// Pipeline tuning (final/runtime)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of pollers and parser worker processes
    pub num_threads: u32,
    /// Pages per fan-out batch
    pub pdf_page_batch_size: u32,
    /// Parse tasks after which a worker process is recycled
    pub worker_restart_after: u32,
}

/// Backend selection (final/runtime)
#[derive(Debug, Clone, Copy)]
pub struct BackendsConfig {
    pub store: StoreBackendType,
    pub progress: ProgressBackendType,
    pub queue: QueueBackendType,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub s3: S3Config,
    pub sqs: SqsConfig,
    pub pipeline: PipelineConfig,
    pub backends: BackendsConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let file_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match file_path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                tracing::debug!(path = %path.display(), "Config file loaded");
                config
            }
            None => FileConfig::default(),
        };

        let file_server = file_config.server.unwrap_or_default();
        let file_redis = file_config.redis.unwrap_or_default();
        let file_s3 = file_config.s3.unwrap_or_default();
        let file_sqs = file_config.sqs.unwrap_or_default();
        let file_pipeline = file_config.pipeline.unwrap_or_default();
        let file_backends = file_config.backends.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let redis = RedisConfig {
            url: cli
                .redis_url
                .clone()
                .or(file_redis.url)
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            status_channel: cli
                .status_channel
                .clone()
                .or(file_redis.status_channel)
                .unwrap_or_else(|| DEFAULT_STATUS_CHANNEL.to_string()),
        };

        let s3 = S3Config {
            endpoint: cli.s3_endpoint.clone().or(file_s3.endpoint),
            region: cli.s3_region.clone().or(file_s3.region),
            bucket: cli
                .s3_bucket
                .clone()
                .or(file_s3.bucket)
                .unwrap_or_default(),
        };

        let sqs = SqsConfig {
            endpoint: cli.sqs_endpoint.clone().or(file_sqs.endpoint),
            region: cli.sqs_region.clone().or(file_sqs.region),
            documents_queue: cli
                .sqs_documents_queue
                .clone()
                .or(file_sqs.documents_queue)
                .unwrap_or_default(),
            index_documents_queue: cli
                .sqs_index_documents_queue
                .clone()
                .or(file_sqs.index_documents_queue)
                .unwrap_or_default(),
        };

        let pipeline = PipelineConfig {
            num_threads: cli
                .num_threads
                .or(file_pipeline.num_threads)
                .unwrap_or(DEFAULT_NUM_THREADS),
            pdf_page_batch_size: cli
                .pdf_page_batch_size
                .or(file_pipeline.pdf_page_batch_size)
                .unwrap_or(DEFAULT_PDF_PAGE_BATCH_SIZE),
            worker_restart_after: cli
                .worker_restart_after
                .or(file_pipeline.worker_restart_after)
                .unwrap_or(DEFAULT_WORKER_RESTART_AFTER),
        };

        let backends = BackendsConfig {
            store: cli.store_backend.or(file_backends.store).unwrap_or_default(),
            progress: cli
                .progress_backend
                .or(file_backends.progress)
                .unwrap_or_default(),
            queue: cli.queue_backend.or(file_backends.queue).unwrap_or_default(),
        };

        let config = Self {
            server,
            redis,
            s3,
            sqs,
            pipeline,
            backends,
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            store_backend = %config.backends.store,
            progress_backend = %config.backends.progress,
            queue_backend = %config.backends.queue,
            num_threads = config.pipeline.num_threads,
            pdf_page_batch_size = config.pipeline.pdf_page_batch_size,
            worker_restart_after = config.pipeline.worker_restart_after,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        let threads = self.pipeline.num_threads;
        if !(NUM_THREADS_MIN..=NUM_THREADS_MAX).contains(&threads) {
            anyhow::bail!(
                "Configuration error: num_threads ({}) must be between {} and {}",
                threads,
                NUM_THREADS_MIN,
                NUM_THREADS_MAX
            );
        }

        if self.pipeline.pdf_page_batch_size == 0 {
            anyhow::bail!("Configuration error: pdf_page_batch_size must be greater than 0");
        }

        if self.backends.store == StoreBackendType::S3 && self.s3.bucket.is_empty() {
            anyhow::bail!("Configuration error: s3.bucket is required for the s3 store backend");
        }

        if self.backends.progress == ProgressBackendType::Redis && self.redis.url.is_empty() {
            anyhow::bail!(
                "Configuration error: redis.url is required for the redis progress backend"
            );
        }

        if self.backends.queue == QueueBackendType::Sqs {
            if self.sqs.documents_queue.is_empty() {
                anyhow::bail!(
                    "Configuration error: sqs.documents_queue is required for the sqs backend"
                );
            }
            if self.sqs.index_documents_queue.is_empty() {
                anyhow::bail!(
                    "Configuration error: sqs.index_documents_queue is required for the sqs backend"
                );
            }
        }

        Ok(())
    }
}
