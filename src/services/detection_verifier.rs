//! Detection verifier service.
//!
//! Records evidence that detectors actually ran during a run, and judges
//! whether each rule family's required detectors all produced evidence.
//! A family that was silently skipped (for example because of a wiring
//! bug) shows up here as unverified instead of as a clean pass.
//!
//! The evidence table is run-scoped and not synchronized: each run owns
//! its verifier, and concurrent writers must wrap it themselves.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::domain::models::{DetectionEvidence, FamilyVerification};

/// Default family -> required detector table.
pub const FAMILY_REQUIREMENTS: [(&str, &[&str]); 5] = [
    ("BiDi", &["BiDiDetector"]),
    ("Table", &["TableDetector"]),
    ("Bibliography", &["BibliographyDetector"]),
    ("Code", &["CodeDetector"]),
    ("Typeset", &["TypesetDetector"]),
];

/// Serializable verification status per family.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Verification of every registered family.
    pub families: BTreeMap<String, FamilyVerification>,
    /// All recorded evidence, by detector.
    pub evidence: BTreeMap<String, DetectionEvidence>,
    /// Whether every registered family is verified.
    pub all_verified: bool,
}

/// Run-scoped detection evidence recorder.
#[derive(Debug, Clone)]
pub struct DetectionVerifier {
    requirements: BTreeMap<String, Vec<String>>,
    evidence: HashMap<String, DetectionEvidence>,
}

impl Default for DetectionVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionVerifier {
    /// Create a verifier using [`FAMILY_REQUIREMENTS`].
    pub fn new() -> Self {
        Self::with_requirements(FAMILY_REQUIREMENTS.iter().map(|(family, detectors)| {
            (
                (*family).to_string(),
                detectors.iter().map(|d| (*d).to_string()).collect(),
            )
        }))
    }

    /// Create a verifier with a custom requirement table.
    pub fn with_requirements(
        requirements: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Self {
        Self {
            requirements: requirements.into_iter().collect(),
            evidence: HashMap::new(),
        }
    }

    /// Record that `detector_name` ran, replacing any earlier evidence for
    /// it in this run.
    pub fn record_detection(
        &mut self,
        detector_name: &str,
        files_scanned: usize,
        issues_found: usize,
        rules_checked: Vec<String>,
    ) {
        tracing::debug!(
            detector = detector_name,
            files_scanned = files_scanned,
            issues_found = issues_found,
            "Recorded detection evidence"
        );

        self.evidence.insert(
            detector_name.to_string(),
            DetectionEvidence {
                detector_name: detector_name.to_string(),
                invoked_at: Utc::now(),
                files_scanned,
                issues_found,
                rules_checked,
            },
        );
    }

    /// Evidence recorded for a detector, if any.
    pub fn evidence_for(&self, detector_name: &str) -> Option<&DetectionEvidence> {
        self.evidence.get(detector_name)
    }

    /// Detectors a family requires, or `None` if unregistered.
    pub fn required_detectors(&self, family_name: &str) -> Option<&[String]> {
        self.requirements.get(family_name).map(Vec::as_slice)
    }

    /// Judge whether every detector `family_name` requires has evidence.
    ///
    /// A family with no registered requirements cannot be verified and
    /// comes back with `is_verified == false` and `registered == false`.
    pub fn verify_family(&self, family_name: &str) -> FamilyVerification {
        let Some(required) = self.requirements.get(family_name) else {
            return FamilyVerification::unregistered(family_name);
        };

        let missing_detectors: Vec<String> = required
            .iter()
            .filter(|d| !self.evidence.contains_key(d.as_str()))
            .cloned()
            .collect();

        FamilyVerification {
            family_name: family_name.to_string(),
            is_verified: missing_detectors.is_empty(),
            missing_detectors,
            registered: true,
        }
    }

    /// Families from `candidates` that are not verified, in input order.
    pub fn get_unverified_families<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<String> {
        candidates
            .iter()
            .map(AsRef::as_ref)
            .filter(|family| !self.verify_family(family).is_verified)
            .map(str::to_string)
            .collect()
    }

    /// Boolean gate: true when `family_name` is verified. Logs the missing
    /// detectors otherwise.
    pub fn require_verification(&self, family_name: &str) -> bool {
        let verification = self.verify_family(family_name);
        if !verification.is_verified {
            tracing::warn!(
                family = family_name,
                registered = verification.registered,
                missing = ?verification.missing_detectors,
                "Detection not verified for family"
            );
        }
        verification.is_verified
    }

    /// Status of every registered family plus all recorded evidence.
    pub fn get_verification_report(&self) -> VerificationReport {
        let families: BTreeMap<String, FamilyVerification> = self
            .requirements
            .keys()
            .map(|family| (family.clone(), self.verify_family(family)))
            .collect();
        let all_verified = families.values().all(|v| v.is_verified);

        VerificationReport {
            families,
            evidence: self
                .evidence
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            all_verified,
        }
    }

    /// Drop all evidence. Call at the start of a fresh run.
    pub fn clear(&mut self) {
        self.evidence.clear();
    }
}
