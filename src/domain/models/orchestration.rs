//! Orchestration state and result models.
//!
//! A family run moves through [`RunPhase`]s:
//!
//! ```text
//! Pending -> Detecting -> Fixing -> Validating -> Done
//!                 |          |                      ^
//!                 |          +----------------------+
//!                 +--> Done | Failed | Skipped
//! ```
//!
//! and ends with a [`RunStatus`] and a [`Verdict`] for reporting.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::issue::{Issue, Severity};
use super::verification::FamilyVerification;

// ---------------------------------------------------------------------------
// RunPhase
// ---------------------------------------------------------------------------

/// Phase of a single family run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// Not started.
    Pending,
    /// Running detectors.
    Detecting,
    /// Running fixers.
    Fixing,
    /// Re-detecting after fixes.
    Validating,
    /// Finished.
    Done,
    /// Aborted by an error.
    Failed,
    /// Family not applicable to the file.
    #[serde(rename = "SKIP")]
    Skipped,
}

impl RunPhase {
    /// Upper-case name used in serialized records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Detecting => "DETECTING",
            Self::Fixing => "FIXING",
            Self::Validating => "VALIDATING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIP",
        }
    }

    /// Whether no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(&self) -> Vec<RunPhase> {
        match self {
            Self::Pending => vec![Self::Detecting, Self::Skipped],
            Self::Detecting => vec![Self::Fixing, Self::Done, Self::Failed],
            Self::Fixing => vec![Self::Validating, Self::Done, Self::Failed],
            Self::Validating => vec![Self::Done, Self::Failed],
            Self::Done | Self::Failed | Self::Skipped => vec![],
        }
    }

    /// Whether the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunStatus / Verdict
// ---------------------------------------------------------------------------

/// Reported completion status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every phase completed and detection is verified.
    #[serde(rename = "DONE")]
    Done,
    /// Some unit (chunk, fixer, file) failed or detection is unverified.
    #[serde(rename = "PARTIAL")]
    Partial,
    /// The family was disabled or not applicable.
    #[serde(rename = "SKIP")]
    Skip,
}

impl RunStatus {
    /// Upper-case name used in serialized records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "DONE",
            Self::Partial => "PARTIAL",
            Self::Skip => "SKIP",
        }
    }

    /// Combine two statuses: any partial run makes the whole partial;
    /// skip only survives when everything was skipped.
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Partial, _) | (_, Self::Partial) => Self::Partial,
            (Self::Skip, Self::Skip) => Self::Skip,
            _ => Self::Done,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated judgment over unresolved issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// No unresolved warning or critical issues.
    Pass,
    /// Unresolved warnings, no critical issues.
    Warning,
    /// At least one unresolved critical issue.
    Fail,
}

impl Verdict {
    /// Upper-case name used in serialized records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warning => "WARNING",
            Self::Fail => "FAIL",
        }
    }

    /// Worst unresolved severity: any CRITICAL fails, any other issue warns,
    /// no issues pass.
    pub fn from_issues(issues: &[Issue]) -> Self {
        match issues.iter().map(|i| i.severity).max() {
            None => Self::Pass,
            Some(Severity::Critical) => Self::Fail,
            Some(Severity::Warning | Severity::Info) => Self::Warning,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OrchestrationResult
// ---------------------------------------------------------------------------

/// Outcome of one family run over one file.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    /// Family that ran.
    pub family: String,
    /// File it ran on.
    pub file: String,
    /// Run status.
    pub status: RunStatus,
    /// Verdict over the unresolved issues.
    pub verdict: Verdict,
    /// Phases visited, in order.
    pub phases: Vec<RunPhase>,
    /// Issues found by the detection phase.
    pub issues: Vec<Issue>,
    /// Issues still present after the fix (and validation) phases.
    pub unresolved: Vec<Issue>,
    /// Issues the fix phase resolved.
    pub fixes_applied: usize,
    /// Follow-on actions for unresolved issues.
    pub triggers: Vec<String>,
    /// Isolated chunk and fixer failures.
    pub errors: Vec<String>,
    /// Verification at the end of the run; `None` when skipped.
    pub verification: Option<FamilyVerification>,
    /// Content after fixes, when any fixer changed it.
    #[serde(skip)]
    pub fixed_content: Option<String>,
}

impl OrchestrationResult {
    /// Result for a family that did not run on this file.
    pub fn skipped(family: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            file: file.into(),
            status: RunStatus::Skip,
            verdict: Verdict::Pass,
            phases: vec![RunPhase::Pending, RunPhase::Skipped],
            issues: Vec::new(),
            unresolved: Vec::new(),
            fixes_applied: 0,
            triggers: Vec::new(),
            errors: Vec::new(),
            verification: None,
            fixed_content: None,
        }
    }

    /// Last phase reached.
    pub fn final_phase(&self) -> RunPhase {
        self.phases.last().copied().unwrap_or(RunPhase::Pending)
    }

    /// Stable serialization for downstream consumers.
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("family".into(), json!(self.family));
        map.insert("skill".into(), json!(self.family));
        map.insert("file".into(), json!(self.file));
        map.insert("status".into(), json!(self.status.as_str()));
        map.insert("verdict".into(), json!(self.verdict.as_str()));
        map.insert("phase".into(), json!(self.final_phase().as_str()));
        map.insert("issues_found".into(), json!(self.issues.len()));
        map.insert("fixes_applied".into(), json!(self.fixes_applied));
        map.insert("unresolved_count".into(), json!(self.unresolved.len()));
        map.insert("triggers".into(), json!(self.triggers));
        map.insert(
            "issues".into(),
            Value::Array(self.unresolved.iter().map(|i| Value::Object(i.to_map())).collect()),
        );
        map.insert("errors".into(), json!(self.errors));
        map.insert(
            "verified".into(),
            json!(self.verification.as_ref().map(|v| v.is_verified)),
        );
        map
    }
}

// ---------------------------------------------------------------------------
// SuperResult / ProjectResult
// ---------------------------------------------------------------------------

/// Outcome of every selected family over one file.
#[derive(Debug, Clone, Serialize)]
pub struct SuperResult {
    /// File checked.
    pub file: String,
    /// Combined status of the family runs.
    pub status: RunStatus,
    /// Worst family verdict.
    pub verdict: Verdict,
    /// Issues found across families.
    pub total_issues: usize,
    /// Fixes applied across families.
    pub total_fixes: usize,
    /// Per-family results, in run order.
    pub families: Vec<OrchestrationResult>,
    /// Verification of every family that ran.
    pub verification: BTreeMap<String, FamilyVerification>,
    /// Final content after all families ran.
    #[serde(skip)]
    pub content: String,
    /// Whether any family changed the content.
    pub content_changed: bool,
}

impl SuperResult {
    /// Unresolved issues of every family.
    pub fn unresolved(&self) -> impl Iterator<Item = &Issue> {
        self.families.iter().flat_map(|r| r.unresolved.iter())
    }

    /// Stable serialization for downstream consumers.
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("file".into(), json!(self.file));
        map.insert("status".into(), json!(self.status.as_str()));
        map.insert("verdict".into(), json!(self.verdict.as_str()));
        map.insert("total_issues".into(), json!(self.total_issues));
        map.insert("total_fixes".into(), json!(self.total_fixes));
        map.insert("content_changed".into(), json!(self.content_changed));
        map.insert(
            "families".into(),
            Value::Array(self.families.iter().map(|r| Value::Object(r.to_dict())).collect()),
        );
        map
    }
}

/// A file that could not be processed during a project scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// Path relative to the project root.
    pub file: String,
    /// What went wrong.
    pub error: String,
}

/// Aggregate outcome of a project scan.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectResult {
    /// Identifies this scan in logs and reports.
    pub run_id: Uuid,
    /// Project root scanned.
    pub root: String,
    /// Combined status; `PARTIAL` when any file failed.
    pub status: RunStatus,
    /// Worst file verdict.
    pub verdict: Verdict,
    /// Files checked successfully.
    pub files_scanned: usize,
    /// Issues found across files.
    pub total_issues: usize,
    /// Fixes applied across files.
    pub total_fixes: usize,
    /// Per-file results, sorted by path.
    pub files: Vec<SuperResult>,
    /// Files that could not be processed.
    pub failures: Vec<FileFailure>,
}

impl ProjectResult {
    /// Stable serialization for downstream consumers.
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("run_id".into(), json!(self.run_id.to_string()));
        map.insert("root".into(), json!(self.root));
        map.insert("status".into(), json!(self.status.as_str()));
        map.insert("verdict".into(), json!(self.verdict.as_str()));
        map.insert("files_scanned".into(), json!(self.files_scanned));
        map.insert("total_issues".into(), json!(self.total_issues));
        map.insert("total_fixes".into(), json!(self.total_fixes));
        map.insert(
            "files".into(),
            Value::Array(self.files.iter().map(|r| Value::Object(r.to_dict())).collect()),
        );
        map.insert("failures".into(), json!(self.failures));
        map
    }
}
