//! Domain layer for texguard
//!
//! This module contains the issue and orchestration models, errors, and the
//! detector/fixer ports every rule module implements.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult, LockError};
