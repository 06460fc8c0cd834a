//! Infrastructure layer module
//!
//! Process-level concerns the engine itself does not depend on:
//! - Configuration loading and validation
//! - Logging setup
//! - The cross-process project lock file

pub mod config;
pub mod lockfile;
pub mod logging;
