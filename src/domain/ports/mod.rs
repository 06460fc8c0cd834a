//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the two capability interfaces every rule module
//! implements:
//! - Detector: finds issues in document content
//! - Fixer: rewrites content to remediate issues
//!
//! The orchestration services depend only on these traits, never on a
//! concrete rule module.

pub mod detector;
pub mod fixer;

pub use detector::{DetectionScope, Detector};
pub use fixer::{FixPattern, Fixer};
