//! Layered configuration loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use globset::Glob;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, KNOWN_FAMILIES};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Chunk size or overlap out of range.
    #[error("Invalid chunking: {0}")]
    InvalidChunking(String),

    /// Worker count outside 1..=64.
    #[error("Invalid max_workers: {0}. Must be between 1 and 64")]
    InvalidMaxWorkers(usize),

    /// Family name not known to texguard.
    #[error("Unknown family: {0}. Must be one of: BiDi, Table, Bibliography, Code, Typeset")]
    UnknownFamily(String),

    /// Unsupported log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unsupported log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Threshold that must be positive is not.
    #[error("Invalid threshold {name}: {value}. Must be positive")]
    InvalidThreshold { name: &'static str, value: f64 },

    /// Include or exclude glob does not compile.
    #[error("Invalid glob pattern {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// Any other invalid setting.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Project directory holding configuration files.
pub const CONFIG_DIR: &str = ".texguard";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "TEXGUARD_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .texguard/config.yaml (project config)
    /// 3. .texguard/local.yaml (local overrides, optional)
    /// 4. Environment variables (TEXGUARD_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Load configuration for the project rooted at `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let config_dir = dir.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring
    /// environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        config
            .chunking
            .validate()
            .map_err(ConfigError::InvalidChunking)?;

        if config.batch.max_workers == 0 || config.batch.max_workers > 64 {
            return Err(ConfigError::InvalidMaxWorkers(config.batch.max_workers));
        }

        if config.families.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "at least one family must be enabled".to_string(),
            ));
        }
        if let Some(unknown) = config
            .families
            .iter()
            .find(|f| !KNOWN_FAMILIES.contains(&f.as_str()))
        {
            return Err(ConfigError::UnknownFamily(unknown.clone()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.thresholds.code_max_line_length == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "code_max_line_length",
                value: 0.0,
            });
        }
        if config.thresholds.overfull_hbox_pt.is_nan() || config.thresholds.overfull_hbox_pt <= 0.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "overfull_hbox_pt",
                value: config.thresholds.overfull_hbox_pt,
            });
        }

        if config.project.include.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "project.include cannot be empty".to_string(),
            ));
        }
        for pattern in config.project.include.iter().chain(&config.project.exclude) {
            Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}
