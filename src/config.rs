use std::str::FromStr;

use serde::Deserialize;

use crate::aggregation_worker::AggregationWorkerConfig;
use crate::metrics_store::RetentionPolicy;
use crate::writer::RecordWriterConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    /// When false, the live cache still works but nothing is written to SQLite.
    #[serde(default = "default_true")]
    pub persist_enabled: bool,
    #[serde(default = "default_flush_rate")]
    pub flush_rate: u64,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

fn default_max_pool_size() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

fn default_flush_rate() -> u64 {
    50
}

fn default_flush_interval_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Snapshots kept per agent (600 = 10 minutes at 1 Hz).
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

fn default_history_capacity() -> usize {
    crate::live_cache::DEFAULT_HISTORY_CAPACITY
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_raw_retention_days")]
    pub raw_retention_days: u32,
    #[serde(default = "default_hourly_retention_days")]
    pub hourly_retention_days: u32,
    #[serde(default = "default_daily_retention_days")]
    pub daily_retention_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            raw_retention_days: default_raw_retention_days(),
            hourly_retention_days: default_hourly_retention_days(),
            daily_retention_days: default_daily_retention_days(),
        }
    }
}

fn default_raw_retention_days() -> u32 {
    30
}

fn default_hourly_retention_days() -> u32 {
    90
}

fn default_daily_retention_days() -> u32 {
    365
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_rollup_interval_secs")]
    pub rollup_interval_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Cron expression (with seconds field) for cleanup, local time. Overrides cleanup_interval_secs.
    #[serde(default)]
    pub cleanup_schedule: Option<String>,
    #[serde(default)]
    pub vacuum_after_cleanup: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            rollup_interval_secs: default_rollup_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            cleanup_schedule: None,
            vacuum_after_cleanup: false,
        }
    }
}

fn default_rollup_interval_secs() -> u64 {
    3600
}

fn default_cleanup_interval_secs() -> u64 {
    86_400
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.database.flush_rate > 0,
            "database.flush_rate must be > 0, got {}",
            self.database.flush_rate
        );
        anyhow::ensure!(
            self.database.flush_interval_secs > 0,
            "database.flush_interval_secs must be > 0, got {}",
            self.database.flush_interval_secs
        );
        anyhow::ensure!(
            self.cache.history_capacity > 0,
            "cache.history_capacity must be > 0, got {}",
            self.cache.history_capacity
        );
        anyhow::ensure!(
            self.retention.raw_retention_days > 0,
            "retention.raw_retention_days must be > 0, got {}",
            self.retention.raw_retention_days
        );
        anyhow::ensure!(
            self.retention.hourly_retention_days > 0,
            "retention.hourly_retention_days must be > 0, got {}",
            self.retention.hourly_retention_days
        );
        anyhow::ensure!(
            self.retention.daily_retention_days > 0,
            "retention.daily_retention_days must be > 0, got {}",
            self.retention.daily_retention_days
        );
        anyhow::ensure!(
            self.aggregation.rollup_interval_secs > 0,
            "aggregation.rollup_interval_secs must be > 0, got {}",
            self.aggregation.rollup_interval_secs
        );
        anyhow::ensure!(
            self.aggregation.cleanup_interval_secs > 0,
            "aggregation.cleanup_interval_secs must be > 0, got {}",
            self.aggregation.cleanup_interval_secs
        );
        if let Some(expr) = &self.aggregation.cleanup_schedule {
            cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!("aggregation.cleanup_schedule {:?} is not a valid cron expression: {}", expr, e)
            })?;
        }
        Ok(())
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            raw_days: self.retention.raw_retention_days,
            hourly_days: self.retention.hourly_retention_days,
            daily_days: self.retention.daily_retention_days,
        }
    }

    pub fn writer_config(&self) -> RecordWriterConfig {
        RecordWriterConfig {
            flush_rate: self.database.flush_rate,
            flush_interval_secs: self.database.flush_interval_secs,
        }
    }

    pub fn aggregation_worker_config(&self) -> AggregationWorkerConfig {
        AggregationWorkerConfig {
            rollup_interval_secs: self.aggregation.rollup_interval_secs,
            flush_grace_secs: self.database.flush_interval_secs,
            cleanup_interval_secs: self.aggregation.cleanup_interval_secs,
            cleanup_schedule: self.aggregation.cleanup_schedule.clone(),
            vacuum_after_cleanup: self.aggregation.vacuum_after_cleanup,
            retention: self.retention_policy(),
        }
    }
}
