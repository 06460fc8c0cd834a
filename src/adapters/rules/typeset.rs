//! Typesetting rules over LaTeX `.log` output.
//!
//! Detection only: box and reference warnings have no mechanical fix in
//! the log itself.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::models::{Issue, Severity};
use crate::domain::ports::Detector;
use crate::services::family_orchestrator::FamilyDefinition;

/// Overfull box; critical above the configured threshold.
pub const OVERFULL_HBOX: &str = "typeset-overfull-hbox";
/// Underfull box.
pub const UNDERFULL_HBOX: &str = "typeset-underfull-hbox";
/// Reference or citation LaTeX could not resolve.
pub const UNDEFINED_REFERENCE: &str = "typeset-undefined-reference";

/// Reads warnings from LaTeX build logs.
#[derive(Debug, Clone)]
pub struct TypesetDetector {
    overfull: Regex,
    underfull: Regex,
    undefined: Regex,
    /// Overfull boxes wider than this many points are CRITICAL.
    overfull_threshold_pt: f64,
}

impl TypesetDetector {
    /// Detector treating overfull boxes wider than `overfull_threshold_pt` as critical.
    pub fn new(overfull_threshold_pt: f64) -> Result<Self, regex::Error> {
        const SOURCE: &str = r"(?: in (?:paragraph|alignment) at lines (\d+)--(\d+)| detected at line (\d+))?";
        Ok(Self {
            overfull: Regex::new(&format!(r"^Overfull \\hbox \((\d+(?:\.\d+)?)pt too wide\){SOURCE}"))?,
            underfull: Regex::new(&format!(r"^Underfull \\hbox \(badness (\d+)\){SOURCE}"))?,
            undefined: Regex::new(
                r"(Reference|Citation) `([^']+)' on page (\d+) undefined(?: on input line (\d+))?",
            )?,
            overfull_threshold_pt,
        })
    }
}

/// Attach the source line range a box warning points at.
fn with_source_lines(mut issue: Issue, caps: &Captures, first: usize) -> Issue {
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());

    if let (Some(start), Some(end)) = (number(first), number(first + 1)) {
        issue = issue.with_context("source_start", start).with_context("source_end", end);
    } else if let Some(line) = number(first + 2) {
        issue = issue.with_context("source_start", line).with_context("source_end", line);
    }
    issue
}

impl Detector for TypesetDetector {
    fn name(&self) -> &str {
        "TypesetDetector"
    }

    fn detect(&self, content: &str, file_path: &str, offset: usize) -> anyhow::Result<Vec<Issue>> {
        let mut issues = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line_no = offset + idx + 1;

            if let Some(caps) = self.overfull.captures(line) {
                let overfull_pt: f64 = caps[1].parse()?;
                let severity = if overfull_pt > self.overfull_threshold_pt {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                let issue = Issue::new(OVERFULL_HBOX, file_path, line_no, Issue::excerpt(line), severity)
                    .with_fix("rephrase, allow hyphenation, or use \\sloppy locally")
                    .with_context("overfull_pt", overfull_pt);
                issues.push(with_source_lines(issue, &caps, 2));
            } else if let Some(caps) = self.underfull.captures(line) {
                let badness: u64 = caps[1].parse()?;
                let issue = Issue::new(UNDERFULL_HBOX, file_path, line_no, Issue::excerpt(line), Severity::Info)
                    .with_context("badness", badness);
                issues.push(with_source_lines(issue, &caps, 2));
            }

            for caps in self.undefined.captures_iter(line) {
                let kind = caps[1].to_ascii_lowercase();
                let mut issue = Issue::new(UNDEFINED_REFERENCE, file_path, line_no, &caps[2], Severity::Critical)
                    .with_fix("define the label or citation key and rerun LaTeX")
                    .with_context("kind", kind)
                    .with_context("page", caps[3].parse::<u64>()?);
                if let Some(input_line) = caps.get(4) {
                    issue = issue.with_context("source_start", input_line.as_str().parse::<u64>()?);
                }
                issues.push(issue);
            }
        }

        Ok(issues)
    }

    fn get_rules(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                OVERFULL_HBOX.to_string(),
                format!(
                    "overfull \\hbox (CRITICAL above {}pt)",
                    self.overfull_threshold_pt
                ),
            ),
            (UNDERFULL_HBOX.to_string(), "underfull \\hbox".to_string()),
            (
                UNDEFINED_REFERENCE.to_string(),
                "reference or citation undefined in the final run".to_string(),
            ),
        ])
    }
}

/// The Typeset family: `.log` files, detection only.
pub fn family(overfull_threshold_pt: f64) -> Result<FamilyDefinition, regex::Error> {
    Ok(FamilyDefinition::new("Typeset")
        .with_detector(Arc::new(TypesetDetector::new(overfull_threshold_pt)?))
        .with_extensions(&["log"])
        .with_triggers(&["typeset-review"]))
}
