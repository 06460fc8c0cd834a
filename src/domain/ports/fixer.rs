//! Fixer port.

use crate::domain::models::Issue;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A declarative description of one transformation a fixer performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixPattern {
    /// Text shape the fix looks for.
    pub find: String,
    /// What it becomes.
    pub replace: String,
    /// What the fix does.
    pub description: String,
}

impl FixPattern {
    /// Describe a fix pattern.
    pub fn new(
        find: impl Into<String>,
        replace: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
            description: description.into(),
        }
    }
}

/// Port for rule fixers following hexagonal architecture
///
/// Contract:
/// - `fix` only acts on the issues it is handed; it never re-detects.
/// - Applying `fix` to its own output with the same issue list changes
///   nothing further.
/// - Issues whose rule is not a key of [`get_patterns`](Self::get_patterns)
///   are ignored.
pub trait Fixer: Send + Sync {
    /// Stable fixer name (e.g. `"BiDiFixer"`).
    fn name(&self) -> &str;

    /// Return new content with the given issues remediated.
    fn fix(&self, content: &str, issues: &[Issue]) -> Result<String>;

    /// Patterns this fixer applies, keyed by the rule id they remediate.
    fn get_patterns(&self) -> BTreeMap<String, FixPattern>;

    /// Whether this fixer remediates `rule`.
    fn handles(&self, rule: &str) -> bool {
        self.get_patterns().contains_key(rule)
    }
}
