//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Posting and batch configuration.
    #[serde(default)]
    pub posting: PostingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Batch posting configuration.
///
/// Retries are off unless configured: a failed item is recorded and left for the next run.
#[derive(Debug, Clone, Deserialize)]
pub struct PostingConfig {
    /// Upper bound of journals considered per batch invocation.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,
    /// Journals fetched per page while scanning.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Journals posted concurrently within a chunk.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Attempts per journal (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Whether opaque storage errors are retried in addition to conflicts.
    #[serde(default)]
    pub retry_storage_errors: bool,
    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_batch_limit() -> u32 {
    500
}

fn default_chunk_size() -> u32 {
    100
}

fn default_concurrency() -> u32 {
    1
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    50
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            chunk_size: default_chunk_size(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_storage_errors: false,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("COREBOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
