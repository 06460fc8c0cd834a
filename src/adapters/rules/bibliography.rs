//! Bibliography rules.
//!
//! Citation spacing is checked in `.tex` sources; duplicate entry keys in
//! `.bib` databases. Duplicate detection needs every key in the file, so
//! the detector runs over whole documents rather than chunks.

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use super::{rewrite_lines, strip_comment};
use crate::domain::models::{Issue, Severity};
use crate::domain::ports::{DetectionScope, Detector, FixPattern, Fixer};
use crate::services::family_orchestrator::FamilyDefinition;

/// Citation preceded by a breakable space.
pub const CITE_SPACING: &str = "bib-cite-spacing";
/// Entry key defined twice in one database.
pub const DUPLICATE_KEY: &str = "bib-duplicate-key";

/// Entry types that do not define a citation key.
const NON_ENTRY_TYPES: [&str; 3] = ["comment", "string", "preamble"];

fn is_bib_file(file_path: &str) -> bool {
    Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bib"))
}

fn spaced_cite() -> Result<Regex, regex::Error> {
    Regex::new(r"[ \t]+(\\(?:cite[a-zA-Z]*|parencite|textcite)\*?(?:\[[^\]]*\])*\{[^{}]*\})")
}

/// A citation separated from the preceding word by breakable space.
struct SpacedCite<'a> {
    /// Character right before the space.
    before: char,
    /// Byte range of the space run.
    space: Range<usize>,
    /// The citation command.
    cite: &'a str,
}

/// Every spaced citation on `line`. The preceding character is checked
/// outside the pattern so adjacent citations are all found in one pass.
fn spaced_cites<'a>(pattern: &'a Regex, line: &'a str) -> impl Iterator<Item = SpacedCite<'a>> + 'a {
    pattern.captures_iter(line).filter_map(move |caps| {
        let whole = caps.get(0)?;
        let cite = caps.get(1)?;
        let before = line[..whole.start()].chars().next_back()?;
        (!before.is_whitespace() && before != '~').then(|| SpacedCite {
            before,
            space: whole.start()..cite.start(),
            cite: cite.as_str(),
        })
    })
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Finds loose citation spacing in sources and duplicate keys in `.bib` files.
#[derive(Debug, Clone)]
pub struct BibliographyDetector {
    spaced_cite: Regex,
    entry: Regex,
}

impl BibliographyDetector {
    /// Compile the detector's patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            spaced_cite: spaced_cite()?,
            entry: Regex::new(r"^\s*@([A-Za-z]+)\s*[{(]\s*([^,\s{}()]+)\s*,")?,
        })
    }

    fn detect_spacing(&self, content: &str, file_path: &str, offset: usize) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (idx, raw) in content.lines().enumerate() {
            for found in spaced_cites(&self.spaced_cite, strip_comment(raw)) {
                issues.push(
                    Issue::new(CITE_SPACING, file_path, offset + idx + 1, found.cite, Severity::Info)
                        .with_fix(format!("{}~{}", found.before, found.cite)),
                );
            }
        }
        issues
    }

    fn detect_duplicates(&self, content: &str, file_path: &str, offset: usize) -> Vec<Issue> {
        let mut issues = Vec::new();
        let mut first_seen: HashMap<String, usize> = HashMap::new();

        for (idx, line) in content.lines().enumerate() {
            let Some(caps) = self.entry.captures(line) else {
                continue;
            };
            if NON_ENTRY_TYPES.contains(&caps[1].to_ascii_lowercase().as_str()) {
                continue;
            }

            let line_no = offset + idx + 1;
            let key = &caps[2];
            match first_seen.get(&key.to_lowercase()) {
                Some(&first_line) => issues.push(
                    Issue::new(DUPLICATE_KEY, file_path, line_no, key, Severity::Critical)
                        .with_fix("rename or remove the duplicate entry")
                        .with_context("first_line", first_line),
                ),
                None => {
                    first_seen.insert(key.to_lowercase(), line_no);
                }
            }
        }
        issues
    }
}

impl Detector for BibliographyDetector {
    fn name(&self) -> &str {
        "BibliographyDetector"
    }

    fn detect(&self, content: &str, file_path: &str, offset: usize) -> anyhow::Result<Vec<Issue>> {
        Ok(if is_bib_file(file_path) {
            self.detect_duplicates(content, file_path, offset)
        } else {
            self.detect_spacing(content, file_path, offset)
        })
    }

    fn get_rules(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                CITE_SPACING.to_string(),
                "\\cite preceded by a breakable space instead of ~".to_string(),
            ),
            (
                DUPLICATE_KEY.to_string(),
                "bibliography entry key defined more than once".to_string(),
            ),
        ])
    }

    fn scope(&self) -> DetectionScope {
        DetectionScope::Document
    }
}

// ---------------------------------------------------------------------------
// Fixer
// ---------------------------------------------------------------------------

/// Ties flagged citations to the preceding word with `~`.
#[derive(Debug, Clone)]
pub struct BibliographyFixer {
    spaced_cite: Regex,
}

impl BibliographyFixer {
    /// Compile the fixer's patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            spaced_cite: spaced_cite()?,
        })
    }
}

impl Fixer for BibliographyFixer {
    fn name(&self) -> &str {
        "BibliographyFixer"
    }

    fn fix(&self, content: &str, issues: &[Issue]) -> anyhow::Result<String> {
        let mut wanted: HashMap<usize, HashSet<&str>> = HashMap::new();
        for issue in issues.iter().filter(|i| i.rule == CITE_SPACING) {
            wanted.entry(issue.line).or_default().insert(issue.content.as_str());
        }
        if wanted.is_empty() {
            return Ok(content.to_string());
        }

        Ok(rewrite_lines(content, |line_no, line| {
            let cites = wanted.get(&line_no)?;
            let code = strip_comment(line);
            let mut fixed = String::with_capacity(line.len());
            let mut last = 0;
            for found in spaced_cites(&self.spaced_cite, code) {
                if cites.contains(found.cite) {
                    fixed.push_str(&code[last..found.space.start]);
                    fixed.push('~');
                    last = found.space.end;
                }
            }
            (last > 0).then(|| {
                fixed.push_str(&line[last..]);
                fixed
            })
        }))
    }

    fn get_patterns(&self) -> BTreeMap<String, FixPattern> {
        BTreeMap::from([(
            CITE_SPACING.to_string(),
            FixPattern::new("word \\cite{..}", "word~\\cite{..}", "Tie citations to the preceding word"),
        )])
    }
}

/// The Bibliography family: `.tex` sources and `.bib` databases.
pub fn family() -> Result<FamilyDefinition, regex::Error> {
    Ok(FamilyDefinition::new("Bibliography")
        .with_detector(Arc::new(BibliographyDetector::new()?))
        .with_fixer(Arc::new(BibliographyFixer::new()?))
        .with_extensions(&["tex", "bib"])
        .with_triggers(&["bibliography-review"]))
}
