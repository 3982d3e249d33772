use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::ResourceClass;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub collector: CollectorSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorSection {
    pub sample_interval_ms: u64,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Optional cron expression (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    /// Takes precedence over prune_interval_secs.
    #[serde(default)]
    pub prune_schedule: Option<String>,
    #[serde(default = "default_true")]
    pub prune_on_start: bool,
    /// How often to log collector stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
    #[serde(default = "default_classes")]
    pub classes: Vec<ResourceClass>,
    /// Network interfaces starting with any of these are not recorded.
    #[serde(default = "default_exclude_prefixes")]
    pub exclude_prefixes: Vec<String>,
}

fn default_prune_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_stats_log_interval_secs() -> u64 {
    300
}

fn default_classes() -> Vec<ResourceClass> {
    vec![ResourceClass::Network, ResourceClass::Disk]
}

pub fn default_exclude_prefixes() -> Vec<String> {
    ["lo", "docker", "veth", "br-", "virbr", "tap", "tun"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
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
            !self.storage.data_dir.is_empty(),
            "storage.data_dir must be non-empty"
        );
        anyhow::ensure!(
            self.storage.retention_days > 0,
            "storage.retention_days must be > 0, got {}",
            self.storage.retention_days
        );
        anyhow::ensure!(
            self.collector.sample_interval_ms > 0 && self.collector.sample_interval_ms < 60_000,
            "collector.sample_interval_ms must be between 1 and 59999, got {}",
            self.collector.sample_interval_ms
        );
        anyhow::ensure!(
            self.collector.prune_interval_secs > 0,
            "collector.prune_interval_secs must be > 0, got {}",
            self.collector.prune_interval_secs
        );
        if let Some(ref expr) = self.collector.prune_schedule {
            <cron::Schedule as std::str::FromStr>::from_str(expr).map_err(|e| {
                anyhow::anyhow!("collector.prune_schedule '{}' is invalid: {}", expr, e)
            })?;
        }
        anyhow::ensure!(
            self.collector.stats_log_interval_secs > 0,
            "collector.stats_log_interval_secs must be > 0, got {}",
            self.collector.stats_log_interval_secs
        );
        anyhow::ensure!(
            !self.collector.classes.is_empty(),
            "collector.classes must name at least one resource class"
        );
        Ok(())
    }
}

/// Runtime settings consumed by the collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub data_dir: PathBuf,
    pub sample_interval: Duration,
    pub retention_days: u32,
    pub prune_interval: Duration,
    pub prune_schedule: Option<String>,
    pub prune_on_start: bool,
    pub stats_log_interval: Duration,
    pub classes: Vec<ResourceClass>,
    pub exclude_prefixes: Vec<String>,
}

impl CollectorConfig {
    /// Defaults for everything but the data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sample_interval: Duration::from_secs(5),
            retention_days: default_retention_days(),
            prune_interval: Duration::from_secs(default_prune_interval_secs()),
            prune_schedule: None,
            prune_on_start: true,
            stats_log_interval: Duration::from_secs(default_stats_log_interval_secs()),
            classes: default_classes(),
            exclude_prefixes: default_exclude_prefixes(),
        }
    }
}

impl From<&AppConfig> for CollectorConfig {
    fn from(c: &AppConfig) -> Self {
        Self {
            data_dir: PathBuf::from(&c.storage.data_dir),
            sample_interval: Duration::from_millis(c.collector.sample_interval_ms),
            retention_days: c.storage.retention_days,
            prune_interval: Duration::from_secs(c.collector.prune_interval_secs),
            prune_schedule: c.collector.prune_schedule.clone(),
            prune_on_start: c.collector.prune_on_start,
            stats_log_interval: Duration::from_secs(c.collector.stats_log_interval_secs),
            classes: c.collector.classes.clone(),
            exclude_prefixes: c.collector.exclude_prefixes.clone(),
        }
    }
}
