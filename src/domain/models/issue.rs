//! Issue domain model.
//!
//! An [`Issue`] is one detected defect occurrence. Issues are produced by
//! detectors, merged and deduplicated by the batch processor, and consumed
//! by fixers. They are never mutated after creation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{DomainError, DomainResult};

/// Severity of a detected issue.
///
/// Ordered `Info < Warning < Critical`; verdict aggregation relies on this
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational.
    Info,
    /// Should be fixed.
    Warning,
    /// Breaks the document; fails the run.
    Critical,
}

impl Severity {
    /// Upper-case name used in serialized records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(DomainError::InvalidSeverity(other.to_string())),
        }
    }
}

/// A detected defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable rule identifier (e.g. `"bidi-english-in-hebrew"`).
    pub rule: String,
    /// Source path, used for reporting.
    pub file: String,
    /// 1-based line number in the original file.
    pub line: usize,
    /// The offending excerpt, possibly truncated.
    pub content: String,
    /// How serious the issue is.
    pub severity: Severity,
    /// Suggested remediation, if any.
    pub fix: Option<String>,
    /// Rule-specific metadata.
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Borrowed deduplication key: `(file, line, rule, content)`.
pub type IssueKey<'a> = (&'a str, usize, &'a str, &'a str);

impl Issue {
    /// Maximum length of [`Issue::content`] produced by [`Issue::excerpt`].
    pub const EXCERPT_LEN: usize = 120;

    /// New issue without fix or context.
    pub fn new(
        rule: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        content: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            rule: rule.into(),
            file: file.into(),
            line,
            content: content.into(),
            severity,
            fix: None,
            context: Map::new(),
        }
    }

    /// Attach a suggested fix.
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    /// Attach one context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Key under which two issues are the same occurrence.
    pub fn dedup_key(&self) -> IssueKey<'_> {
        (&self.file, self.line, &self.rule, &self.content)
    }

    /// Trim a line to a display excerpt on a char boundary.
    pub fn excerpt(text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.chars().count() <= Self::EXCERPT_LEN {
            trimmed.to_string()
        } else {
            let cut: String = trimmed.chars().take(Self::EXCERPT_LEN).collect();
            format!("{cut}...")
        }
    }

    /// Serialize into a flat map with keys
    /// `rule, file, line, content, severity, fix, context`.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("rule".into(), Value::String(self.rule.clone()));
        map.insert("file".into(), Value::String(self.file.clone()));
        map.insert("line".into(), Value::from(self.line));
        map.insert("content".into(), Value::String(self.content.clone()));
        map.insert("severity".into(), Value::String(self.severity.to_string()));
        map.insert(
            "fix".into(),
            self.fix.clone().map_or(Value::Null, Value::String),
        );
        map.insert("context".into(), Value::Object(self.context.clone()));
        map
    }

    /// Build an issue from a flat map, as produced by [`Issue::to_map`].
    ///
    /// `rule`, `file`, `line`, `content` and `severity` are required;
    /// `fix` and `context` are optional.
    pub fn from_map(map: &Map<String, Value>) -> DomainResult<Self> {
        let rule = required_str(map, "rule")?;
        let file = required_str(map, "file")?;
        let content = required_str(map, "content")?;
        let line = map
            .get("line")
            .and_then(Value::as_u64)
            .ok_or_else(|| DomainError::MalformedIssue("missing or non-integer 'line'".into()))?;
        let line = usize::try_from(line)
            .map_err(|_| DomainError::MalformedIssue(format!("line {line} out of range")))?;
        let severity: Severity = required_str(map, "severity")?.parse()?;

        let fix = match map.get("fix") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(DomainError::MalformedIssue(format!(
                    "'fix' must be a string or null, got {other}"
                )))
            }
        };

        let context = match map.get("context") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(obj)) => obj.clone(),
            Some(other) => {
                return Err(DomainError::MalformedIssue(format!(
                    "'context' must be an object, got {other}"
                )))
            }
        };

        Ok(Self {
            rule,
            file,
            line,
            content,
            severity,
            fix,
            context,
        })
    }
}

fn required_str(map: &Map<String, Value>, key: &str) -> DomainResult<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DomainError::MalformedIssue(format!("missing or non-string '{key}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(
            [Severity::Warning, Severity::Critical, Severity::Info]
                .into_iter()
                .max(),
            Some(Severity::Critical)
        );
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("INFO".parse::<Severity>().unwrap(), Severity::Info);
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert!(matches!(
            "warning".parse::<Severity>(),
            Err(DomainError::InvalidSeverity(s)) if s == "warning"
        ));
    }

    #[test]
    fn test_map_round_trip_keeps_context() {
        let issue = Issue::new("table-column-mismatch", "a.tex", 12, "a & b & c", Severity::Critical)
            .with_fix("remove the extra cell")
            .with_context("expected_columns", 2);

        let map = issue.to_map();
        assert_eq!(map["severity"], json!("CRITICAL"));
        assert_eq!(map["line"], json!(12));

        let back = Issue::from_map(&map).unwrap();
        assert_eq!(back, issue);
    }

    #[test]
    fn test_from_map_rejects_bad_severity() {
        let map = json!({
            "rule": "x", "file": "a.tex", "line": 1, "content": "y", "severity": "FATAL"
        });
        let err = Issue::from_map(map.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidSeverity(_)));
    }

    #[test]
    fn test_from_map_optional_fields_default() {
        let map = json!({
            "rule": "x", "file": "a.tex", "line": 3, "content": "y", "severity": "INFO"
        });
        let issue = Issue::from_map(map.as_object().unwrap()).unwrap();
        assert!(issue.fix.is_none());
        assert!(issue.context.is_empty());
    }

    #[test]
    fn test_from_map_missing_line() {
        let map = json!({ "rule": "x", "file": "a.tex", "content": "y", "severity": "INFO" });
        assert!(matches!(
            Issue::from_map(map.as_object().unwrap()),
            Err(DomainError::MalformedIssue(_))
        ));
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let long = "א".repeat(200);
        let excerpt = Issue::excerpt(&long);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), Issue::EXCERPT_LEN + 3);
    }
}
