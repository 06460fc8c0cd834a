//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber. Output goes to
//! stderr (so `--json` reports on stdout stay clean) and, when a log
//! directory is configured, to a daily rolling JSON file.

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat};
pub use logger::LoggerImpl;
