//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following
//! precedence (highest to lowest):
//! 1. Environment variables (prefix: `RGWEXP_`)
//! 2. Current working directory: `./config.toml`
//! 3. XDG config directory: `~/.config/rgw-usage-exporter/config.toml`
//! 4. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Top-level configuration for the exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub admin: AdminConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub kv: KvConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin: AdminConfig::default(),
            bus: BusConfig::default(),
            scrape: ScrapeConfig::default(),
            schedule: ScheduleConfig::default(),
            labels: LabelsConfig::default(),
            kv: KvConfig::default(),
            pool: PoolConfig::default(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// RGW admin API connection, required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub admin_url: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
}

/// Message bus destination for published cycle snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub nats_url: String,
    #[serde(default = "default_nats_subject")]
    pub nats_subject: String,
    #[serde(default)]
    pub use_nats: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            nats_url: String::new(),
            nats_subject: default_nats_subject(),
            use_nats: false,
        }
    }
}

/// Scrape endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_true")]
    pub prometheus: bool,
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
    #[serde(default = "default_bind_addr")]
    pub scrape_bind_addr: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            prometheus: default_true(),
            prometheus_port: default_prometheus_port(),
            scrape_bind_addr: default_bind_addr(),
        }
    }
}

/// Sync/aggregation cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_sync_interval")]
    pub interval: u64,
    #[serde(default = "default_aggregate_interval")]
    pub aggregate_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_sync_interval(),
            aggregate_interval_secs: default_aggregate_interval(),
        }
    }
}

/// Labels attached to every exported series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelsConfig {
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub instance_id: String,
}

/// State store backing selection, unchanged from the spec's configuration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvConfig {
    #[serde(default)]
    pub sync_control_nats: bool,
    #[serde(default)]
    pub sync_external_nats: bool,
    #[serde(default)]
    pub sync_control_url: String,
    #[serde(default = "default_bucket_prefix")]
    pub sync_control_bucket_prefix: String,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            sync_control_nats: false,
            sync_external_nats: false,
            sync_control_url: String::new(),
            sync_control_bucket_prefix: default_bucket_prefix(),
        }
    }
}

/// Worker-pool fan-out and retry policy for syncer fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_width")]
    pub worker_pool_width: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_pool_width: default_pool_width(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_nats_subject() -> String {
    "rgw.usage.metrics".to_string()
}
fn default_prometheus_port() -> u16 {
    9242
}
fn default_bind_addr() -> String {
    "0.0.0.0:9242".to_string()
}
fn default_sync_interval() -> u64 {
    60
}
fn default_aggregate_interval() -> u64 {
    30
}
fn default_bucket_prefix() -> String {
    "rgwexp".to_string()
}
fn default_pool_width() -> usize {
    10
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    2
}

impl Config {
    /// Load configuration from all sources: defaults, `./config.toml`, the
    /// XDG config file, then `RGWEXP_`-prefixed environment variables
    /// (highest priority).
    pub fn load() -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = Self::xdg_config_path() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("RGWEXP_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, bypassing XDG lookup.
    /// Useful for tests and non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("RGWEXP_").split("_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn xdg_config_path() -> Option<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("rgw-usage-exporter");
        xdg_dirs.find_config_file("config.toml")
    }

    /// Reject configurations the admin client would refuse to construct
    /// from; fatal at startup per the exit-code contract.
    fn validate(&self) -> Result<()> {
        if self.admin.admin_url.is_empty() {
            return Err(crate::error::Error::BadConfig(
                "admin.admin_url must not be empty".into(),
            ));
        }
        if self.admin.access_key.is_empty() || self.admin.secret_key.is_empty() {
            return Err(crate::error::Error::BadConfig(
                "admin.access_key and admin.secret_key must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg = Config::default();
        assert_eq!(cfg.schedule.interval, 60);
        assert_eq!(cfg.schedule.aggregate_interval_secs, 30);
        assert_eq!(cfg.pool.worker_pool_width, 10);
        assert_eq!(cfg.pool.retry_attempts, 3);
        assert_eq!(cfg.kv.sync_control_bucket_prefix, "rgwexp");
    }

    #[test]
    fn rejects_empty_admin_url() {
        let cfg = Config::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_populated_admin_block() {
        let mut cfg = Config::default();
        cfg.admin.admin_url = "https://rgw.example.com".into();
        cfg.admin.access_key = "ak".into();
        cfg.admin.secret_key = "sk".into();
        assert!(cfg.validate().is_ok());
    }
}
