//! Built-in rule modules and the family catalog.
//!
//! Each submodule implements the [`Detector`](crate::domain::ports::Detector)
//! and, where the defect is mechanically fixable,
//! [`Fixer`](crate::domain::ports::Fixer) ports for one defect family, and
//! exposes a `family()` constructor that wires them into a
//! [`FamilyDefinition`].

pub mod bibliography;
pub mod bidi;
pub mod code;
pub mod table;
pub mod typeset;

use serde::Serialize;

use crate::domain::errors::DomainResult;
use crate::domain::models::ThresholdsConfig;
use crate::services::family_orchestrator::FamilyDefinition;

// ---------------------------------------------------------------------------
// FamilyCatalog
// ---------------------------------------------------------------------------

/// One row of the rule listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    /// Family the rule belongs to.
    pub family: String,
    /// Rule id, as found on issues.
    pub rule: String,
    /// One-line description.
    pub description: String,
    /// Detector reporting the rule.
    pub detector: String,
    /// Fixer with a pattern for the rule, if any.
    pub fixer: Option<String>,
}

/// Registry of rule families by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FamilyCatalog {
    families: Vec<FamilyDefinition>,
}

impl FamilyCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in families, tuned by `thresholds`.
    pub fn builtin(thresholds: &ThresholdsConfig) -> DomainResult<Self> {
        let mut catalog = Self::new();
        catalog.register(bidi::family()?);
        catalog.register(table::family()?);
        catalog.register(bibliography::family()?);
        catalog.register(code::family(thresholds.code_max_line_length)?);
        catalog.register(typeset::family(thresholds.overfull_hbox_pt)?);
        Ok(catalog)
    }

    /// Add a family, replacing any family of the same name.
    pub fn register(&mut self, family: FamilyDefinition) {
        match self.families.iter_mut().find(|f| f.name == family.name) {
            Some(existing) => *existing = family,
            None => self.families.push(family),
        }
    }

    /// Family by name.
    pub fn get(&self, name: &str) -> Option<&FamilyDefinition> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Whether a family of that name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Family names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.families.iter().map(|f| f.name.as_str()).collect()
    }

    /// Families in run order.
    pub fn iter(&self) -> impl Iterator<Item = &FamilyDefinition> {
        self.families.iter()
    }

    /// Every rule of every family with its detector and owning fixer.
    pub fn rules(&self) -> Vec<RuleInfo> {
        let mut rules = Vec::new();
        for family in &self.families {
            for detector in &family.detectors {
                for (rule, description) in detector.get_rules() {
                    let fixer = family
                        .fixers
                        .iter()
                        .find(|f| f.handles(&rule))
                        .map(|f| f.name().to_string());
                    rules.push(RuleInfo {
                        family: family.name.clone(),
                        rule,
                        description,
                        detector: detector.name().to_string(),
                        fixer,
                    });
                }
            }
        }
        rules
    }
}

// ---------------------------------------------------------------------------
// Line helpers shared by the rule modules
// ---------------------------------------------------------------------------

/// The part of a LaTeX line before an unescaped `%`.
pub(crate) fn strip_comment(line: &str) -> &str {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' => escaped = !escaped,
            '%' if !escaped => return &line[..i],
            _ => escaped = false,
        }
    }
    line
}

/// Lines of `content` as `(body, terminator)` pairs, where the terminator
/// is `"\n"`, `"\r\n"` or empty for an unterminated last line.
pub(crate) fn split_lines(content: &str) -> Vec<(&str, &str)> {
    content
        .split_inclusive('\n')
        .map(|raw| {
            let body = raw
                .strip_suffix('\n')
                .map(|b| b.strip_suffix('\r').unwrap_or(b))
                .unwrap_or(raw);
            (body, &raw[body.len()..])
        })
        .collect()
}

/// Rebuild `content`, replacing the body of each line for which `rewrite`
/// returns `Some`. Line numbers passed to `rewrite` are 1-based; line
/// terminators are preserved.
pub(crate) fn rewrite_lines(
    content: &str,
    mut rewrite: impl FnMut(usize, &str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(content.len());
    for (idx, (body, end)) in split_lines(content).into_iter().enumerate() {
        match rewrite(idx + 1, body) {
            Some(replaced) => out.push_str(&replaced),
            None => out.push_str(body),
        }
        out.push_str(end);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::KNOWN_FAMILIES;

    #[test]
    fn test_builtin_catalog_has_known_families() {
        let catalog = FamilyCatalog::builtin(&ThresholdsConfig::default()).unwrap();
        assert_eq!(catalog.names(), KNOWN_FAMILIES.to_vec());
        assert!(catalog.get("Typeset").unwrap().fixers.is_empty());
    }

    #[test]
    fn test_rules_listing_names_owning_fixer() {
        let catalog = FamilyCatalog::builtin(&ThresholdsConfig::default()).unwrap();
        let rules = catalog.rules();

        let tab = rules.iter().find(|r| r.rule == "code-tab-character").unwrap();
        assert_eq!(tab.family, "Code");
        assert_eq!(tab.fixer.as_deref(), Some("CodeFixer"));

        let overflow = rules.iter().find(|r| r.rule == "code-line-overflow").unwrap();
        assert!(overflow.fixer.is_none());
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut catalog = FamilyCatalog::new();
        catalog.register(FamilyDefinition::new("X").with_extensions(&["tex"]));
        catalog.register(FamilyDefinition::new("X"));
        assert_eq!(catalog.names(), vec!["X"]);
        assert!(catalog.get("X").unwrap().extensions.is_empty());
    }

    #[test]
    fn test_strip_comment_respects_escapes() {
        assert_eq!(strip_comment("50\\% done % note"), "50\\% done ");
        assert_eq!(strip_comment("\\\\% comment"), "\\\\");
        assert_eq!(strip_comment("no comment"), "no comment");
    }

    #[test]
    fn test_rewrite_lines_keeps_terminators() {
        let out = rewrite_lines("a\r\nb\nc", |n, body| (n == 2).then(|| body.to_uppercase()));
        assert_eq!(out, "a\r\nB\nc");
    }
}
