use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::{ProgressBackendType, QueueBackendType, StoreBackendType};
use super::constants::{
    ENV_CONFIG, ENV_HOST, ENV_NUM_THREADS, ENV_PDF_PAGE_BATCH_SIZE, ENV_PORT,
    ENV_PROGRESS_BACKEND, ENV_QUEUE_BACKEND, ENV_REDIS_URL, ENV_S3_BUCKET, ENV_S3_ENDPOINT,
    ENV_S3_REGION, ENV_SQS_DOCUMENTS_QUEUE, ENV_SQS_ENDPOINT, ENV_SQS_INDEX_DOCUMENTS_QUEUE,
    ENV_SQS_REGION, ENV_STATUS_CHANNEL, ENV_STORE_BACKEND, ENV_WORKER_RESTART_AFTER,
};

#[derive(Parser)]
#[command(name = "docflow")]
#[command(version, about = "Distributed document ingestion worker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Health endpoint host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Health endpoint port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Redis connection URL (progress records and status notifications)
    #[arg(long, global = true, env = ENV_REDIS_URL)]
    pub redis_url: Option<String>,

    /// Pub/sub channel for document status notifications
    #[arg(long, global = true, env = ENV_STATUS_CHANNEL)]
    pub status_channel: Option<String>,

    /// Artifact store backend (s3 or memory)
    #[arg(long, global = true, env = ENV_STORE_BACKEND, value_parser = parse_store_backend)]
    pub store_backend: Option<StoreBackendType>,

    /// Progress registry backend (redis or memory)
    #[arg(long, global = true, env = ENV_PROGRESS_BACKEND, value_parser = parse_progress_backend)]
    pub progress_backend: Option<ProgressBackendType>,

    /// Queue backend (sqs or memory)
    #[arg(long, global = true, env = ENV_QUEUE_BACKEND, value_parser = parse_queue_backend)]
    pub queue_backend: Option<QueueBackendType>,

    /// S3 endpoint override (LocalStack/MinIO)
    #[arg(long, global = true, env = ENV_S3_ENDPOINT)]
    pub s3_endpoint: Option<String>,

    /// S3 region
    #[arg(long, global = true, env = ENV_S3_REGION)]
    pub s3_region: Option<String>,

    /// S3 bucket holding document artifacts
    #[arg(long, global = true, env = ENV_S3_BUCKET)]
    pub s3_bucket: Option<String>,

    /// SQS endpoint override (LocalStack)
    #[arg(long, global = true, env = ENV_SQS_ENDPOINT)]
    pub sqs_endpoint: Option<String>,

    /// SQS region
    #[arg(long, global = true, env = ENV_SQS_REGION)]
    pub sqs_region: Option<String>,

    /// Processing queue URL (parse/split commands)
    #[arg(long, global = true, env = ENV_SQS_DOCUMENTS_QUEUE)]
    pub sqs_documents_queue: Option<String>,

    /// Indexing queue URL (index commands, write-only)
    #[arg(long, global = true, env = ENV_SQS_INDEX_DOCUMENTS_QUEUE)]
    pub sqs_index_documents_queue: Option<String>,

    /// Number of pollers and parser worker processes (1-10)
    #[arg(long, global = true, env = ENV_NUM_THREADS)]
    pub num_threads: Option<u32>,

    /// Pages per PDF batch for fan-out
    #[arg(long, global = true, env = ENV_PDF_PAGE_BATCH_SIZE)]
    pub pdf_page_batch_size: Option<u32>,

    /// Parse tasks after which a worker process is recycled
    #[arg(long, global = true, env = ENV_WORKER_RESTART_AFTER)]
    pub worker_restart_after: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the worker (default when no subcommand is given)
    Start,

    /// Internal: run a parser worker child process attached to stdin/stdout
    #[command(hide = true)]
    ParserWorker {
        #[arg(long, default_value_t = 0)]
        worker_id: u32,
    },
}

/// CLI configuration extracted for config loading
pub type CliConfig = Cli;

pub fn parse() -> Cli {
    Cli::parse()
}

/// Parse store backend from CLI/env string
fn parse_store_backend(s: &str) -> Result<StoreBackendType, String> {
    match s.to_lowercase().as_str() {
        "s3" => Ok(StoreBackendType::S3),
        "memory" => Ok(StoreBackendType::Memory),
        _ => Err(format!(
            "Invalid store backend '{}'. Valid options: s3, memory",
            s
        )),
    }
}

/// Parse progress backend from CLI/env string
fn parse_progress_backend(s: &str) -> Result<ProgressBackendType, String> {
    match s.to_lowercase().as_str() {
        "redis" => Ok(ProgressBackendType::Redis),
        "memory" => Ok(ProgressBackendType::Memory),
        _ => Err(format!(
            "Invalid progress backend '{}'. Valid options: redis, memory",
            s
        )),
    }
}

/// Parse queue backend from CLI/env string
fn parse_queue_backend(s: &str) -> Result<QueueBackendType, String> {
    match s.to_lowercase().as_str() {
        "sqs" => Ok(QueueBackendType::Sqs),
        "memory" => Ok(QueueBackendType::Memory),
        _ => Err(format!(
            "Invalid queue backend '{}'. Valid options: sqs, memory",
            s
        )),
    }
}
