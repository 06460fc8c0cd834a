//! Code listing rules.
//!
//! Applies to lines inside `lstlisting`, `verbatim`, `Verbatim` and
//! `minted` environments. Whether a line is inside a listing depends on
//! every line above it, so detection runs over whole documents.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::rewrite_lines;
use crate::domain::models::{Issue, Severity};
use crate::domain::ports::{DetectionScope, Detector, FixPattern, Fixer};
use crate::services::family_orchestrator::FamilyDefinition;

/// Tab character inside a listing.
pub const TAB_CHARACTER: &str = "code-tab-character";
/// Listing line longer than the configured maximum.
pub const LINE_OVERFLOW: &str = "code-line-overflow";

/// Columns a tab expands to.
pub const TAB_WIDTH: usize = 4;

/// Display width of a code line with tabs expanded.
fn display_width(line: &str) -> usize {
    line.chars().map(|c| if c == '\t' { TAB_WIDTH } else { 1 }).sum()
}

/// Checks listing bodies for tabs and overlong lines.
#[derive(Debug, Clone)]
pub struct CodeDetector {
    begin: Regex,
    max_line_length: usize,
}

impl CodeDetector {
    /// Detector flagging listing lines longer than `max_line_length` columns.
    pub fn new(max_line_length: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            begin: Regex::new(r"\\begin\{(lstlisting|verbatim\*?|Verbatim|minted)\}")?,
            max_line_length,
        })
    }
}

impl Detector for CodeDetector {
    fn name(&self) -> &str {
        "CodeDetector"
    }

    fn detect(&self, content: &str, file_path: &str, offset: usize) -> anyhow::Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut closing: Option<String> = None;

        for (idx, line) in content.lines().enumerate() {
            let line_no = offset + idx + 1;

            let Some(end_marker) = closing.as_deref() else {
                if let Some(caps) = self.begin.captures(line) {
                    closing = Some(format!("\\end{{{}}}", &caps[1]));
                }
                continue;
            };
            if line.contains(end_marker) {
                closing = None;
                continue;
            }

            if line.contains('\t') {
                issues.push(
                    Issue::new(TAB_CHARACTER, file_path, line_no, Issue::excerpt(line), Severity::Info)
                        .with_fix(format!("expand tabs to {TAB_WIDTH} spaces")),
                );
            }
            let width = display_width(line);
            if width > self.max_line_length {
                issues.push(
                    Issue::new(LINE_OVERFLOW, file_path, line_no, Issue::excerpt(line), Severity::Warning)
                        .with_fix("wrap the line or enable breaklines")
                        .with_context("length", width)
                        .with_context("limit", self.max_line_length),
                );
            }
        }

        Ok(issues)
    }

    fn get_rules(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                TAB_CHARACTER.to_string(),
                "tab character inside a code listing".to_string(),
            ),
            (
                LINE_OVERFLOW.to_string(),
                format!("code line wider than {} columns", self.max_line_length),
            ),
        ])
    }

    fn scope(&self) -> DetectionScope {
        DetectionScope::Document
    }
}

/// Expands tabs on the lines named by tab issues.
#[derive(Debug, Clone, Default)]
pub struct CodeFixer;

impl Fixer for CodeFixer {
    fn name(&self) -> &str {
        "CodeFixer"
    }

    fn fix(&self, content: &str, issues: &[Issue]) -> anyhow::Result<String> {
        let lines: HashSet<usize> = issues
            .iter()
            .filter(|i| i.rule == TAB_CHARACTER)
            .map(|i| i.line)
            .collect();
        if lines.is_empty() {
            return Ok(content.to_string());
        }

        let spaces = " ".repeat(TAB_WIDTH);
        Ok(rewrite_lines(content, |line_no, line| {
            (lines.contains(&line_no) && line.contains('\t')).then(|| line.replace('\t', &spaces))
        }))
    }

    fn get_patterns(&self) -> BTreeMap<String, FixPattern> {
        BTreeMap::from([(
            TAB_CHARACTER.to_string(),
            FixPattern::new("\\t", " ".repeat(TAB_WIDTH), "Expand tabs in listings"),
        )])
    }
}

/// The Code family: `.tex` sources, re-validated after fixing.
pub fn family(max_line_length: usize) -> Result<FamilyDefinition, regex::Error> {
    Ok(FamilyDefinition::new("Code")
        .with_detector(Arc::new(CodeDetector::new(max_line_length)?))
        .with_fixer(Arc::new(CodeFixer))
        .with_extensions(&["tex"])
        .validating()
        .with_triggers(&["code-reformat"]))
}
