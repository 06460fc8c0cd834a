//! Engine configuration.

use serde::{Deserialize, Serialize};

use super::chunking::ChunkingConfig;

/// Names of every family the engine knows how to run.
pub const KNOWN_FAMILIES: [&str; 5] = ["BiDi", "Table", "Bibliography", "Code", "Typeset"];

/// Main configuration structure for texguard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Enabled rule families
    #[serde(default = "default_families")]
    pub families: Vec<String>,

    /// Document chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Batch processing configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Resource locking configuration
    #[serde(default)]
    pub locking: LockingConfig,

    /// Rule thresholds
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    /// Project file discovery
    #[serde(default)]
    pub project: ProjectConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_families() -> Vec<String> {
    KNOWN_FAMILIES.iter().map(|f| (*f).to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            families: default_families(),
            chunking: ChunkingConfig::default(),
            batch: BatchConfig::default(),
            locking: LockingConfig::default(),
            thresholds: ThresholdsConfig::default(),
            project: ProjectConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum concurrent chunk workers (also bounds concurrent files)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Dispatch chunks to the worker pool; false processes in order
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

const fn default_max_workers() -> usize {
    4
}

const fn default_parallel() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            parallel: default_parallel(),
        }
    }
}

/// Resource locking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LockingConfig {
    /// How long to wait for a project lock before giving up
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Age after which a held lock is reported as stale
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

const fn default_acquire_timeout_secs() -> u64 {
    30
}

const fn default_stale_after_secs() -> u64 {
    600
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_secs: default_acquire_timeout_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

/// Rule thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ThresholdsConfig {
    /// Longest allowed line inside a code listing
    #[serde(default = "default_code_max_line_length")]
    pub code_max_line_length: usize,

    /// Overfull boxes wider than this (in pt) are critical
    #[serde(default = "default_overfull_hbox_pt")]
    pub overfull_hbox_pt: f64,
}

const fn default_code_max_line_length() -> usize {
    100
}

const fn default_overfull_hbox_pt() -> f64 {
    10.0
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            code_max_line_length: default_code_max_line_length(),
            overfull_hbox_pt: default_overfull_hbox_pt(),
        }
    }
}

/// Project file discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectConfig {
    /// Glob patterns (relative to the project root) to scan
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Glob patterns to skip
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec![
        "**/*.tex".to_string(),
        "**/*.bib".to_string(),
        "**/*.log".to_string(),
    ]
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
