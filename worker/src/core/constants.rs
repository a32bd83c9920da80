// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "Docflow";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "docflow";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "docflow.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "DOCFLOW_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "DOCFLOW_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "DOCFLOW_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "DOCFLOW_LOG";

// =============================================================================
// Environment Variables - Backends
// =============================================================================

pub const ENV_STORE_BACKEND: &str = "DOCFLOW_STORE_BACKEND";
pub const ENV_PROGRESS_BACKEND: &str = "DOCFLOW_PROGRESS_BACKEND";
pub const ENV_QUEUE_BACKEND: &str = "DOCFLOW_QUEUE_BACKEND";

pub const ENV_REDIS_URL: &str = "DOCFLOW_REDIS_URL";
pub const ENV_STATUS_CHANNEL: &str = "DOCFLOW_STATUS_CHANNEL";

pub const ENV_S3_ENDPOINT: &str = "DOCFLOW_S3_ENDPOINT";
pub const ENV_S3_REGION: &str = "DOCFLOW_S3_REGION";
pub const ENV_S3_BUCKET: &str = "DOCFLOW_S3_BUCKET";

pub const ENV_SQS_ENDPOINT: &str = "DOCFLOW_SQS_ENDPOINT";
pub const ENV_SQS_REGION: &str = "DOCFLOW_SQS_REGION";
pub const ENV_SQS_DOCUMENTS_QUEUE: &str = "DOCFLOW_SQS_DOCUMENTS_QUEUE";
pub const ENV_SQS_INDEX_DOCUMENTS_QUEUE: &str = "DOCFLOW_SQS_INDEX_DOCUMENTS_QUEUE";

// =============================================================================
// Environment Variables - Pipeline
// =============================================================================

pub const ENV_NUM_THREADS: &str = "DOCFLOW_NUM_THREADS";
pub const ENV_PDF_PAGE_BATCH_SIZE: &str = "DOCFLOW_PDF_PAGE_BATCH_SIZE";
pub const ENV_WORKER_RESTART_AFTER: &str = "DOCFLOW_WORKER_RESTART_AFTER";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default health endpoint port
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// Pipeline Defaults
// =============================================================================

/// Default Redis URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default pub/sub channel for document status notifications
pub const DEFAULT_STATUS_CHANNEL: &str = "document:status";

/// Default number of pollers / parser workers
pub const DEFAULT_NUM_THREADS: u32 = 2;

/// Inclusive bounds for `num_threads`; startup fails outside this range
pub const NUM_THREADS_MIN: u32 = 1;
pub const NUM_THREADS_MAX: u32 = 10;

/// Default pages per PDF batch; documents at or below this size are not split
pub const DEFAULT_PDF_PAGE_BATCH_SIZE: u32 = 10;

/// Default number of parse tasks after which a worker process is recycled
pub const DEFAULT_WORKER_RESTART_AFTER: u32 = 20;

/// TTL for progress records in the registry
pub const PROGRESS_TTL_SECS: u64 = 30;

/// Delay when re-enqueueing a command whose stage is already in progress.
/// Must exceed PROGRESS_TTL_SECS so a crashed worker's record expires first.
pub const REQUEUE_DELAY_SECS: u32 = 180;

/// Long-poll wait per receive call
pub const QUEUE_WAIT_SECS: u32 = 5;

/// Message visibility timeout while a command is being processed
pub const QUEUE_VISIBILITY_TIMEOUT_SECS: u32 = 120;

/// Backoff after a queue receive error before the poller retries
pub const POLL_ERROR_BACKOFF_SECS: u64 = 5;

// =============================================================================
// Parser Workers
// =============================================================================

/// Grace period for a worker child to exit after a shutdown command
pub const WORKER_SHUTDOWN_WAIT_SECS: u64 = 10;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
