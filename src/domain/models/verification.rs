//! Detection evidence and family verification models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record that a specific detector executed during the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvidence {
    /// Detector that ran.
    pub detector_name: String,
    /// When it last ran.
    pub invoked_at: DateTime<Utc>,
    /// Files or chunks it scanned.
    pub files_scanned: usize,
    /// Issues it reported.
    pub issues_found: usize,
    /// Rules it checked.
    pub rules_checked: Vec<String>,
}

/// Whether every detector a family requires produced evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyVerification {
    /// Family judged.
    pub family_name: String,
    /// Whether every required detector left evidence.
    pub is_verified: bool,
    /// Required detectors with no recorded evidence, in registry order.
    pub missing_detectors: Vec<String>,
    /// False when the family has no entry in the requirement registry.
    pub registered: bool,
}

impl FamilyVerification {
    /// Verification for a family with no registered requirements.
    pub fn unregistered(family_name: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            is_verified: false,
            missing_detectors: Vec::new(),
            registered: false,
        }
    }
}
