//! CLI command implementations.

pub mod check;
pub mod chunks;
pub mod rules;
