//! Bidirectional text rules for Hebrew/English documents.
//!
//! In a right-to-left paragraph, bare Latin words must be wrapped in
//! `\en{..}` so the bidi engine lays them out left-to-right. The reverse
//! mistake, Hebrew inside `\en{..}`, breaks the layout outright.

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use super::{rewrite_lines, strip_comment};
use crate::domain::models::{Issue, Severity};
use crate::domain::ports::{Detector, FixPattern, Fixer};
use crate::services::family_orchestrator::FamilyDefinition;

/// Latin term inside a Hebrew line without an `\en{}` wrapper.
pub const ENGLISH_IN_HEBREW: &str = "bidi-english-in-hebrew";
/// Hebrew text inside an `\en{}` wrapper.
pub const HEBREW_IN_ENGLISH: &str = "bidi-hebrew-in-english";

#[derive(Debug, Clone)]
struct BidiPatterns {
    hebrew: Regex,
    /// Spans whose Latin text is already handled: `\en{..}`, inline math,
    /// commands with their arguments, escaped characters.
    protected: Regex,
    latin_run: Regex,
    en_wrapper: Regex,
}

impl BidiPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            hebrew: Regex::new(r"\p{Hebrew}")?,
            protected: Regex::new(
                r"\\en\{[^{}]*\}|\$[^$]*\$|\\[A-Za-z]+\*?(?:\[[^\]]*\])*(?:\{[^{}]*\})*|\\[^A-Za-z]",
            )?,
            latin_run: Regex::new(r"[A-Za-z][A-Za-z0-9'\-]*(?: +[A-Za-z][A-Za-z0-9'\-]*)*")?,
            en_wrapper: Regex::new(r"\\en\{([^{}]*)\}")?,
        })
    }

    /// Bare Latin runs on a line whose unprotected text contains Hebrew.
    fn bare_latin_runs<'a>(&self, line: &'a str) -> Vec<(Range<usize>, &'a str)> {
        if !self.hebrew.is_match(line) {
            return Vec::new();
        }
        let protected: Vec<Range<usize>> =
            self.protected.find_iter(line).map(|m| m.range()).collect();
        let is_bare = |r: &Range<usize>| !protected.iter().any(|p| p.start < r.end && r.start < p.end);

        if !self.hebrew.find_iter(line).any(|m| is_bare(&m.range())) {
            return Vec::new();
        }

        self.latin_run
            .find_iter(line)
            .filter(|m| is_bare(&m.range()))
            .map(|m| (m.range(), m.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Finds unwrapped mixed-direction runs.
#[derive(Debug, Clone)]
pub struct BiDiDetector {
    patterns: BidiPatterns,
}

impl BiDiDetector {
    /// Compile the detector's patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: BidiPatterns::new()?,
        })
    }
}

impl Detector for BiDiDetector {
    fn name(&self) -> &str {
        "BiDiDetector"
    }

    fn detect(&self, content: &str, file_path: &str, offset: usize) -> anyhow::Result<Vec<Issue>> {
        let mut issues = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = offset + idx + 1;
            let line = strip_comment(raw);

            for (_, run) in self.patterns.bare_latin_runs(line) {
                issues.push(
                    Issue::new(ENGLISH_IN_HEBREW, file_path, line_no, run, Severity::Warning)
                        .with_fix(format!("\\en{{{run}}}")),
                );
            }

            for caps in self.patterns.en_wrapper.captures_iter(line) {
                if self.patterns.hebrew.is_match(&caps[1]) {
                    issues.push(
                        Issue::new(HEBREW_IN_ENGLISH, file_path, line_no, &caps[0], Severity::Critical)
                            .with_fix("move the Hebrew text outside \\en{}"),
                    );
                }
            }
        }

        Ok(issues)
    }

    fn get_rules(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                ENGLISH_IN_HEBREW.to_string(),
                "Latin text in a Hebrew line not wrapped in \\en{}".to_string(),
            ),
            (
                HEBREW_IN_ENGLISH.to_string(),
                "Hebrew text inside an \\en{} wrapper".to_string(),
            ),
        ])
    }
}

// ---------------------------------------------------------------------------
// Fixer
// ---------------------------------------------------------------------------

/// Wraps flagged Latin runs in `\en{}`.
#[derive(Debug, Clone)]
pub struct BiDiFixer {
    patterns: BidiPatterns,
}

impl BiDiFixer {
    /// Compile the fixer's patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: BidiPatterns::new()?,
        })
    }
}

impl Fixer for BiDiFixer {
    fn name(&self) -> &str {
        "BiDiFixer"
    }

    fn fix(&self, content: &str, issues: &[Issue]) -> anyhow::Result<String> {
        let mut wanted: HashMap<usize, HashSet<&str>> = HashMap::new();
        for issue in issues.iter().filter(|i| i.rule == ENGLISH_IN_HEBREW) {
            wanted.entry(issue.line).or_default().insert(issue.content.as_str());
        }
        if wanted.is_empty() {
            return Ok(content.to_string());
        }

        Ok(rewrite_lines(content, |line_no, line| {
            let runs = wanted.get(&line_no)?;
            let targets: Vec<Range<usize>> = self
                .patterns
                .bare_latin_runs(strip_comment(line))
                .into_iter()
                .filter(|(_, run)| runs.contains(run))
                .map(|(range, _)| range)
                .collect();
            if targets.is_empty() {
                return None;
            }

            let mut out = line.to_string();
            for range in targets.into_iter().rev() {
                let wrapped = format!("\\en{{{}}}", &line[range.clone()]);
                out.replace_range(range, &wrapped);
            }
            Some(out)
        }))
    }

    fn get_patterns(&self) -> BTreeMap<String, FixPattern> {
        BTreeMap::from([(
            ENGLISH_IN_HEBREW.to_string(),
            FixPattern::new("<latin run>", "\\en{<latin run>}", "Wrap bare Latin text in \\en{}"),
        )])
    }
}

/// The BiDi family: runs on `.tex` sources and re-validates after fixing.
pub fn family() -> Result<FamilyDefinition, regex::Error> {
    Ok(FamilyDefinition::new("BiDi")
        .with_detector(Arc::new(BiDiDetector::new()?))
        .with_fixer(Arc::new(BiDiFixer::new()?))
        .with_extensions(&["tex"])
        .validating()
        .with_triggers(&["bidi-review"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(content: &str) -> Vec<Issue> {
        BiDiDetector::new().unwrap().detect(content, "a.tex", 0).unwrap()
    }

    #[test]
    fn test_flags_bare_latin_in_hebrew_line() {
        let issues = detect("שלום Hello World עולם\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, ENGLISH_IN_HEBREW);
        assert_eq!(issues[0].content, "Hello World");
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].fix.as_deref(), Some("\\en{Hello World}"));
    }

    #[test]
    fn test_ignores_wrapped_commands_math_and_comments() {
        let content = "שלום \\en{Hello} \\textbf{bold} $x+y$ % note here\n\
                       Plain English line without Hebrew\n";
        assert!(detect(content).is_empty());
    }

    #[test]
    fn test_offset_applies_to_line_numbers() {
        let issues = BiDiDetector::new()
            .unwrap()
            .detect("text\nשלום API\n", "a.tex", 100)
            .unwrap();
        assert_eq!(issues[0].line, 102);
    }

    #[test]
    fn test_hebrew_inside_en_is_critical() {
        let issues = detect("Some text \\en{שלום}\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, HEBREW_IN_ENGLISH);
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn test_fix_wraps_runs_and_is_idempotent() {
        let content = "שלום API ו-API עולם\nno change here\n";
        let issues = detect(content);
        let fixer = BiDiFixer::new().unwrap();

        let once = fixer.fix(content, &issues).unwrap();
        assert_eq!(once, "שלום \\en{API} ו-\\en{API} עולם\nno change here\n");
        assert!(detect(&once).is_empty());

        let twice = fixer.fix(&once, &issues).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_fixer_ignores_foreign_rules() {
        let fixer = BiDiFixer::new().unwrap();
        let issue = Issue::new("table-missing-caption", "a.tex", 1, "API", Severity::Warning);
        assert_eq!(fixer.fix("שלום API\n", &[issue]).unwrap(), "שלום API\n");
        assert!(fixer.handles(ENGLISH_IN_HEBREW));
        assert!(!fixer.handles(HEBREW_IN_ENGLISH));
    }
}
