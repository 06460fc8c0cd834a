//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment: programmatic defaults, the
//! project's `.texguard/` YAML files, then `TEXGUARD_*` environment
//! overrides. Everything loaded is validated before use.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR, ENV_PREFIX};
