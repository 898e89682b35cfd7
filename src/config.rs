//! Configuration module for feedmon.

use serde::Deserialize;
use std::path::Path;

use crate::{FeedmonError, Result};

/// Telegram transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API key issued by BotFather.
    #[serde(default)]
    pub api_key: String,
    /// Server-side long-poll timeout in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Maximum number of updates requested per long-poll call.
    #[serde(default = "default_updates_limit")]
    pub updates_limit: i64,
}

fn default_poll_timeout() -> u64 {
    900
}

fn default_updates_limit() -> i64 {
    100
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            poll_timeout_secs: default_poll_timeout(),
            updates_limit: default_updates_limit(),
        }
    }
}

/// Command dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Shared secret accepted by `/auth`.
    #[serde(default)]
    pub secret: String,
    /// Number of worker tasks draining the update queue.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Maximum number of queued updates before new ones are rejected.
    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: usize,
}

fn default_num_workers() -> usize {
    4
}

fn default_queue_max_size() -> usize {
    1000
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            num_workers: default_num_workers(),
            queue_max_size: default_queue_max_size(),
        }
    }
}

/// Feed polling scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Number of independent shard workers polling feeds.
    #[serde(default = "default_shard_workers")]
    pub num_workers: usize,
    /// Feed refresh interval in seconds, anchored to cycle start.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Capacity of the per-user recently-notified item cache.
    #[serde(default = "default_max_recents")]
    pub max_recents: usize,
}

fn default_shard_workers() -> usize {
    2
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_max_recents() -> usize {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_workers: default_shard_workers(),
            refresh_interval_secs: default_refresh_interval(),
            max_recents: default_max_recents(),
        }
    }
}

/// Feed fetcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    256 * 1024
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
        }
    }
}

/// Persistent storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for per-user state files.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "data/state".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedmon.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Telegram transport configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Command dispatcher configuration.
    #[serde(default)]
    pub bot: BotConfig,
    /// Feed polling scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Feed fetcher configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// Persistent storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedmonError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedmonError::Validation(format!("config parse error: {e}")))
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the API key or bot secret is missing, or if a
    /// worker pool is configured with zero workers.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.api_key.is_empty() {
            return Err(FeedmonError::Validation(
                "telegram.api_key is not set".to_string(),
            ));
        }
        if self.bot.secret.is_empty() {
            return Err(FeedmonError::Validation(
                "bot.secret is not set".to_string(),
            ));
        }
        if self.bot.num_workers == 0 {
            return Err(FeedmonError::Validation(
                "bot.num_workers must be at least 1".to_string(),
            ));
        }
        if self.scheduler.num_workers == 0 {
            return Err(FeedmonError::Validation(
                "scheduler.num_workers must be at least 1".to_string(),
            ));
        }
        if self.bot.queue_max_size == 0 {
            return Err(FeedmonError::Validation(
                "bot.queue_max_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
