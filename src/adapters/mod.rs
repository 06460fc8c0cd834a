//! Concrete rule modules implementing the detector and fixer ports.

pub mod rules;

pub use rules::{FamilyCatalog, RuleInfo};
