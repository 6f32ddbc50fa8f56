use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::services::StrategyKind;

/// Largest accepted worker concurrency
pub const MAX_CONCURRENCY: usize = 64;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid concurrency: {0}. Must be between 1 and {MAX_CONCURRENCY}")]
    InvalidConcurrency(usize),

    #[error("Invalid sequence_limit: {0}. Must be at least 1")]
    InvalidSequenceLimit(usize),

    #[error("Invalid branching_factor: {0}. Must be at least 2")]
    InvalidBranchingFactor(usize),

    #[error("Unknown search strategy: {0}. Must be one of: bin_seq, bin_search, comp_search")]
    InvalidStrategy(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Worker image cannot be empty")]
    EmptyImage,

    #[error("Poll interval cannot be 0")]
    ZeroPollInterval,

    #[error("Invalid probes_per_second: {0}. Must be at least 1")]
    InvalidProbeRate(u32),

    #[error("Snapshot URL template must contain '{{id}}': {0}")]
    InvalidUrlTemplate(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .bci/config.yaml (project config)
    /// 3. .bci/local.yaml (local overrides, optional)
    /// 4. Environment variables (BCI_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`] with `.bci/` looked up under `root`.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(".bci");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("BCI_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let search = &config.search;
        if search.concurrency == 0 || search.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidConcurrency(search.concurrency));
        }
        if search.sequence_limit == 0 {
            return Err(ConfigError::InvalidSequenceLimit(search.sequence_limit));
        }
        if let Some(factor) = search.branching_factor {
            if factor < 2 {
                return Err(ConfigError::InvalidBranchingFactor(factor));
            }
        }
        if search.strategy.parse::<StrategyKind>().is_err() {
            return Err(ConfigError::InvalidStrategy(search.strategy.clone()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.dispatcher.image.trim().is_empty() {
            return Err(ConfigError::EmptyImage);
        }
        if config.dispatcher.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        if config.availability.probes_per_second == 0 {
            return Err(ConfigError::InvalidProbeRate(
                config.availability.probes_per_second,
            ));
        }
        if let Some(ref template) = config.availability.snapshot_url_template {
            if !template.contains("{id}") {
                return Err(ConfigError::InvalidUrlTemplate(template.clone()));
            }
        }

        if config.results.database_path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        Ok(())
    }
}
