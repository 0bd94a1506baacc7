//! Configuration structures for the stockflow system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Minimum allowed sensor poll interval.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Named resource profile: which concrete capability constructors a run
/// resolves at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// In-memory fakes seeded with fixture data.
    Local,
    /// S3-compatible object store and Redis.
    Production,
}

impl Profile {
    #[inline]
    pub fn is_local(self) -> bool {
        matches!(self, Profile::Local)
    }
}

impl std::str::FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Profile::Local),
            "production" => Ok(Profile::Production),
            other => Err(Error::config(format!(
                "unknown profile {other:?} (expected \"local\" or \"production\")"
            ))),
        }
    }
}

/// Main configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active resource profile.
    pub profile: Profile,
    /// External store connection settings.
    pub resources: ResourceConfig,
    /// Source data layout.
    pub source: SourceConfig,
    /// Sensor configuration.
    pub sensor: SensorConfig,
    /// Schedule configuration.
    pub schedule: ScheduleConfig,
    /// Retry configuration.
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: Profile::Local,
            resources: ResourceConfig::default(),
            source: SourceConfig::default(),
            sensor: SensorConfig::default(),
            schedule: ScheduleConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing fields fall back to
    /// their defaults, so partial files are fine.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }

    /// Reject configurations the orchestrator must not start with.
    ///
    /// Cron expressions are parsed (and rejected) when the schedules are
    /// built at startup, not here.
    pub fn validate(&self) -> Result<()> {
        if self.sensor.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(Error::config(format!(
                "sensor poll interval {}s is below the {}s minimum",
                self.sensor.poll_interval_secs, MIN_POLL_INTERVAL_SECS
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry max_attempts must be at least 1"));
        }
        if self.schedule.local_cron.trim().is_empty()
            || self.schedule.production_cron.trim().is_empty()
        {
            return Err(Error::config("schedule cron expressions must be non-empty"));
        }
        if self.source.prefix.is_empty() {
            return Err(Error::config("source prefix must be non-empty"));
        }
        Ok(())
    }
}

/// Connection settings for both external stores, injected per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Object store settings.
    pub store: StoreConfig,
    /// Key-value store settings.
    pub kv: KvConfig,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            kv: KvConfig::default(),
        }
    }
}

/// Object store (S3-compatible) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bucket holding the source files.
    pub bucket: String,
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Endpoint URL (e.g. a localstack instance).
    pub endpoint_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: "dagster".to_string(),
            access_key: "test".to_string(),
            secret_key: "test".to_string(),
            endpoint_url: "http://localstack:4566".to_string(),
        }
    }
}

/// Key-value store (Redis) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            host: "redis".to_string(),
            port: 6379,
        }
    }
}

/// Where the source data lives inside the bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Key prefix listed by the sensor and used by the partition resolver.
    pub prefix: String,
    /// Object key processed by the single unpartitioned local run.
    pub local_object_key: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            prefix: "prefix".to_string(),
            local_object_key: "prefix/stock_9.csv".to_string(),
        }
    }
}

/// Sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Seconds between poll ticks. Never below [`MIN_POLL_INTERVAL_SECS`].
    pub poll_interval_secs: u64,
    /// Path of the durable seen-key ledger. `None` keeps the ledger in
    /// memory only, losing dedup state on restart.
    pub ledger_path: Option<PathBuf>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: MIN_POLL_INTERVAL_SECS,
            ledger_path: None,
        }
    }
}

/// Named cron cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Frequent local-dev cadence (single unpartitioned run).
    pub local_cron: String,
    /// Coarser production cadence (fan-out over all partitions).
    pub production_cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            local_cron: "*/15 * * * *".to_string(),
            production_cron: "0 * * * *".to_string(),
        }
    }
}

/// Retry envelope configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per run, counting the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts, in seconds.
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_secs: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.profile, Profile::Local);
        assert_eq!(config.resources.store.bucket, "dagster");
        assert_eq!(config.resources.kv.port, 6379);
        assert_eq!(config.sensor.poll_interval_secs, 30);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.schedule.production_cron, "0 * * * *");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"profile": "production", "retry": {"delay_secs": 2}}"#)
                .unwrap();
        assert_eq!(config.profile, Profile::Production);
        assert_eq!(config.retry.delay_secs, 2);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.source.prefix, "prefix");
    }

    #[test]
    fn test_validate_rejects_fast_poll() {
        let mut config = Config::default();
        config.sensor.poll_interval_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("local".parse::<Profile>().unwrap(), Profile::Local);
        assert_eq!("production".parse::<Profile>().unwrap(), Profile::Production);
        assert!("staging".parse::<Profile>().is_err());
    }
}
