//! Table environment rules.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::{split_lines, strip_comment};
use crate::domain::models::{Issue, Severity};
use crate::domain::ports::{DetectionScope, Detector, FixPattern, Fixer};
use crate::services::family_orchestrator::FamilyDefinition;

/// Table float without `\centering`.
pub const MISSING_CENTERING: &str = "table-missing-centering";
/// Table float without `\caption`.
pub const MISSING_CAPTION: &str = "table-missing-caption";
/// Tabular row with more cells than declared columns.
pub const COLUMN_MISMATCH: &str = "table-column-mismatch";

#[derive(Debug, Clone)]
struct TablePatterns {
    begin_table: Regex,
    end_table: Regex,
    begin_tabular: Regex,
    end_tabular: Regex,
}

impl TablePatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            begin_table: Regex::new(r"\\begin\{table\*?\}")?,
            end_table: Regex::new(r"\\end\{table\*?\}")?,
            begin_tabular: Regex::new(
                r"\\begin\{tabular[x*]?\}(?:\[[^\]]*\])?(?:\{[^{}]*\})?\{((?:[^{}]|\{[^{}]*\})*)\}",
            )?,
            end_tabular: Regex::new(r"\\end\{tabular[x*]?\}")?,
        })
    }
}

/// Split a leading `{..}` group off `s`, returning `(inner, rest)`.
/// Without a leading group, returns `("", s)`.
fn take_group(s: &str) -> (&str, &str) {
    let trimmed = s.trim_start();
    if !trimmed.starts_with('{') {
        return ("", s);
    }
    let mut depth = 0usize;
    for (i, c) in trimmed.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return (&trimmed[1..i], &trimmed[i + 1..]);
                }
            }
            _ => {}
        }
    }
    ("", "")
}

/// Number of columns a `tabular` column specification declares.
fn count_columns(spec: &str) -> usize {
    let mut count: usize = 0;
    let mut rest = spec;

    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        match c {
            'l' | 'c' | 'r' | 'X' | 'S' => count = count.saturating_add(1),
            'p' | 'm' | 'b' => {
                count = count.saturating_add(1);
                rest = take_group(rest).1;
            }
            '@' | '!' | '>' | '<' => rest = take_group(rest).1,
            '*' => {
                let (times, after) = take_group(rest);
                let (inner, after) = take_group(after);
                let repeated = times
                    .trim()
                    .parse::<usize>()
                    .unwrap_or(1)
                    .saturating_mul(count_columns(inner));
                count = count.saturating_add(repeated);
                rest = after;
            }
            _ => {}
        }
    }
    count
}

/// Cells on a tabular row line, or `None` for lines that are not plain rows.
fn count_cells(row: &str) -> Option<usize> {
    if row.contains("\\multicolumn") {
        return None;
    }
    let mut separators = 0;
    let mut escaped = false;
    for c in row.chars() {
        match c {
            '\\' => escaped = !escaped,
            '&' if !escaped => separators += 1,
            _ => escaped = false,
        }
    }
    (separators > 0).then_some(separators + 1)
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct OpenTable {
    line: usize,
    header: String,
    centered: bool,
    captioned: bool,
}

/// Checks table floats and tabular rows.
#[derive(Debug, Clone)]
pub struct TableDetector {
    patterns: TablePatterns,
}

impl TableDetector {
    /// Compile the detector's patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: TablePatterns::new()?,
        })
    }

    fn check_row(&self, row: &str, columns: usize, file_path: &str, line_no: usize) -> Option<Issue> {
        let cells = count_cells(row)?;
        (columns > 0 && cells > columns).then(|| {
            Issue::new(COLUMN_MISMATCH, file_path, line_no, Issue::excerpt(row), Severity::Critical)
                .with_fix("remove the extra cells or widen the column specification")
                .with_context("expected", columns)
                .with_context("found", cells)
        })
    }
}

impl Detector for TableDetector {
    fn name(&self) -> &str {
        "TableDetector"
    }

    fn detect(&self, content: &str, file_path: &str, offset: usize) -> anyhow::Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut table: Option<OpenTable> = None;
        let mut columns: Option<usize> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = offset + idx + 1;
            let line = strip_comment(raw);

            if self.patterns.begin_table.is_match(line) {
                table = Some(OpenTable {
                    line: line_no,
                    header: Issue::excerpt(line),
                    centered: false,
                    captioned: false,
                });
            }
            if let Some(open) = table.as_mut() {
                open.centered |= line.contains("\\centering") || line.contains("\\begin{center}");
                open.captioned |= line.contains("\\caption");
            }

            if let Some(caps) = self.patterns.begin_tabular.captures(line) {
                columns = Some(count_columns(&caps[1]));
            } else if let Some(expected) = columns {
                let row = match self.patterns.end_tabular.find(line) {
                    Some(end) => {
                        columns = None;
                        &line[..end.start()]
                    }
                    None => line,
                };
                issues.extend(self.check_row(row, expected, file_path, line_no));
            }

            if self.patterns.end_table.is_match(line) {
                if let Some(open) = table.take() {
                    if !open.centered {
                        issues.push(
                            Issue::new(MISSING_CENTERING, file_path, open.line, &open.header, Severity::Info)
                                .with_fix("insert \\centering after \\begin{table}"),
                        );
                    }
                    if !open.captioned {
                        issues.push(
                            Issue::new(MISSING_CAPTION, file_path, open.line, &open.header, Severity::Warning)
                                .with_fix("add a \\caption{} to the table"),
                        );
                    }
                }
            }
        }

        Ok(issues)
    }

    fn get_rules(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                MISSING_CENTERING.to_string(),
                "table environment without \\centering".to_string(),
            ),
            (
                MISSING_CAPTION.to_string(),
                "table environment without \\caption".to_string(),
            ),
            (
                COLUMN_MISMATCH.to_string(),
                "tabular row with more cells than declared columns".to_string(),
            ),
        ])
    }

    /// Table state spans many lines, so chunk windows would cut it.
    fn scope(&self) -> DetectionScope {
        DetectionScope::Document
    }
}

// ---------------------------------------------------------------------------
// Fixer
// ---------------------------------------------------------------------------

/// Inserts `\centering` into uncentered tables.
#[derive(Debug, Clone)]
pub struct TableFixer {
    patterns: TablePatterns,
}

impl TableFixer {
    /// Compile the fixer's patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: TablePatterns::new()?,
        })
    }
}

impl Fixer for TableFixer {
    fn name(&self) -> &str {
        "TableFixer"
    }

    fn fix(&self, content: &str, issues: &[Issue]) -> anyhow::Result<String> {
        let targets: HashSet<usize> = issues
            .iter()
            .filter(|i| i.rule == MISSING_CENTERING)
            .map(|i| i.line)
            .collect();
        if targets.is_empty() {
            return Ok(content.to_string());
        }

        let lines = split_lines(content);
        let mut out = String::with_capacity(content.len() + 16 * targets.len());

        for (idx, (body, end)) in lines.iter().enumerate() {
            out.push_str(body);
            out.push_str(end);

            if !targets.contains(&(idx + 1)) || end.is_empty() || !self.patterns.begin_table.is_match(body) {
                continue;
            }
            let already_centered = lines
                .get(idx + 1)
                .is_some_and(|(next, _)| next.trim_start().starts_with("\\centering"));
            if already_centered {
                continue;
            }

            let indent = &body[..body.len() - body.trim_start().len()];
            out.push_str(indent);
            out.push_str("  \\centering");
            out.push_str(end);
        }

        Ok(out)
    }

    fn get_patterns(&self) -> BTreeMap<String, FixPattern> {
        BTreeMap::from([(
            MISSING_CENTERING.to_string(),
            FixPattern::new(
                "\\begin{table}",
                "\\begin{table}\n  \\centering",
                "Center the table body",
            ),
        )])
    }
}

/// The Table family: runs on `.tex` sources.
pub fn family() -> Result<FamilyDefinition, regex::Error> {
    Ok(FamilyDefinition::new("Table")
        .with_detector(Arc::new(TableDetector::new()?))
        .with_fixer(Arc::new(TableFixer::new()?))
        .with_extensions(&["tex"])
        .with_triggers(&["table-review"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\\begin{table}[h]\n\
                         \\begin{tabular}{|l|c|}\n\
                         a & b \\\\\n\
                         a & b & c \\\\\n\
                         \\end{tabular}\n\
                         \\end{table}\n";

    fn detect(content: &str) -> Vec<Issue> {
        TableDetector::new().unwrap().detect(content, "t.tex", 0).unwrap()
    }

    fn rules(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(|i| i.rule.as_str()).collect()
    }

    #[test]
    fn test_count_columns() {
        assert_eq!(count_columns("|l|c|r|"), 3);
        assert_eq!(count_columns("lp{3cm}@{}r"), 3);
        assert_eq!(count_columns("*{4}{c}l"), 5);
        assert_eq!(count_columns(">{\\bfseries}lX"), 2);
    }

    #[test]
    fn test_count_columns_saturates_on_huge_repeat() {
        assert_eq!(count_columns("*{18446744073709551615}{cc}"), usize::MAX);
        assert_eq!(count_columns("l*{18446744073709551615}{c}"), usize::MAX);
    }

    #[test]
    fn test_detector_sees_whole_document() {
        assert_eq!(TableDetector::new().unwrap().scope(), DetectionScope::Document);
    }

    #[test]
    fn test_detects_all_table_rules() {
        let issues = detect(TABLE);
        assert_eq!(rules(&issues), vec![COLUMN_MISMATCH, MISSING_CENTERING, MISSING_CAPTION]);

        let mismatch = &issues[0];
        assert_eq!(mismatch.line, 4);
        assert_eq!(mismatch.context["expected"], 2);
        assert_eq!(mismatch.context["found"], 3);
        assert_eq!(issues[1].line, 1);
    }

    #[test]
    fn test_complete_table_is_clean() {
        let content = "\\begin{table}\n\\centering\n\\caption{Results}\n\
                       \\begin{tabular}{lr}\na & 1 \\\\\n\\multicolumn{3}{c}{x} \\\\\n\\end{tabular}\n\\end{table}\n";
        assert!(detect(content).is_empty());
    }

    #[test]
    fn test_escaped_ampersand_is_not_a_cell() {
        let content = "\\begin{tabular}{ll}\nR\\&D & yes \\\\\n\\end{tabular}\n";
        assert!(detect(content).is_empty());
    }

    #[test]
    fn test_fix_inserts_centering_once() {
        let issues = detect(TABLE);
        let fixer = TableFixer::new().unwrap();

        let once = fixer.fix(TABLE, &issues).unwrap();
        assert!(once.starts_with("\\begin{table}[h]\n  \\centering\n\\begin{tabular}"));
        assert!(!rules(&detect(&once)).contains(&MISSING_CENTERING));

        let twice = fixer.fix(&once, &issues).unwrap();
        assert_eq!(twice, once);
    }
}
