//! Family orchestrator.
//!
//! Runs one rule family (its detectors and fixers) over one file through
//! the run state machine:
//!
//! ```text
//! PENDING -> DETECTING -> [FIXING -> [VALIDATING]] -> DONE
//!         \-> SKIP                 (family not applicable to the file)
//! DETECTING -> FAILED              (every detector failed)
//! ```
//!
//! Detection evidence is recorded on the caller's [`DetectionVerifier`];
//! a run whose family is not verified afterwards reports `PARTIAL`.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Chunk, Issue, OrchestrationResult, RunPhase, RunStatus, Verdict,
};
use crate::domain::ports::{DetectionScope, Detector, Fixer};
use crate::services::batch_processor::{
    dedup_issues, panic_message, BatchProcessor, ChunkProcessor,
};
use crate::services::chunker::Chunker;
use crate::services::detection_verifier::DetectionVerifier;

/// Static description of a rule family: which rule modules it runs and on
/// which files.
#[derive(Clone)]
pub struct FamilyDefinition {
    /// Family name, as used in configuration and reports.
    pub name: String,
    /// Detectors, run in order.
    pub detectors: Vec<Arc<dyn Detector>>,
    /// Fixers, threaded in order.
    pub fixers: Vec<Arc<dyn Fixer>>,
    /// Lowercase file extensions without the dot. Empty matches every file.
    pub extensions: Vec<String>,
    /// Re-run detection after fixing to confirm what was resolved.
    pub validates: bool,
    /// Follow-on actions for unresolved issues no fixer can handle.
    pub triggers: Vec<String>,
}

impl std::fmt::Debug for FamilyDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FamilyDefinition")
            .field("name", &self.name)
            .field("detectors", &self.detectors.iter().map(|d| d.name()).collect::<Vec<_>>())
            .field("fixers", &self.fixers.iter().map(|x| x.name()).collect::<Vec<_>>())
            .field("extensions", &self.extensions)
            .field("validates", &self.validates)
            .field("triggers", &self.triggers)
            .finish()
    }
}

impl FamilyDefinition {
    /// Empty family applying to every file.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detectors: Vec::new(),
            fixers: Vec::new(),
            extensions: Vec::new(),
            validates: false,
            triggers: Vec::new(),
        }
    }

    /// Add a detector.
    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Add a fixer.
    pub fn with_fixer(mut self, fixer: Arc<dyn Fixer>) -> Self {
        self.fixers.push(fixer);
        self
    }

    /// Restrict the family to files with these extensions.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_ascii_lowercase()).collect();
        self
    }

    /// Re-detect after fixing and count fixes from what disappeared.
    pub fn validating(mut self) -> Self {
        self.validates = true;
        self
    }

    /// Triggers raised when issues remain unresolved.
    pub fn with_triggers(mut self, triggers: &[&str]) -> Self {
        self.triggers = triggers.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Whether the family runs on `file_path`, judged by extension.
    pub fn applies_to(&self, file_path: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    fn is_fixable(&self, rule: &str) -> bool {
        self.fixers.iter().any(|f| f.handles(rule))
    }
}

/// Output of the detection phase.
#[derive(Debug, Default)]
struct Detection {
    issues: Vec<Issue>,
    errors: Vec<String>,
    detectors_ok: usize,
}

/// Output of the fix phase.
#[derive(Debug)]
struct FixOutcome {
    content: String,
    /// Issues owned by a fixer that changed the content.
    changed: Vec<Issue>,
    errors: Vec<String>,
}

/// Drives one family's detectors and fixers over a file.
#[derive(Debug, Clone)]
pub struct FamilyOrchestrator {
    family: FamilyDefinition,
    chunker: Chunker,
    batch: BatchProcessor,
    parallel: bool,
}

impl FamilyOrchestrator {
    /// Orchestrator with the default chunker and batch processor.
    pub fn new(family: FamilyDefinition) -> Self {
        Self {
            family,
            chunker: Chunker::new(),
            batch: BatchProcessor::default(),
            parallel: true,
        }
    }

    /// Use `chunker` for chunked detection.
    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Use `batch`, sequentially unless `parallel`.
    pub fn with_batch(mut self, batch: BatchProcessor, parallel: bool) -> Self {
        self.batch = batch;
        self.parallel = parallel;
        self
    }

    /// Family name.
    pub fn name(&self) -> &str {
        &self.family.name
    }

    /// The family definition run.
    pub fn definition(&self) -> &FamilyDefinition {
        &self.family
    }

    /// Run the family over `content`.
    ///
    /// Detection always runs first. With `apply_fixes`, fixers owning the
    /// detected rules run next, and validating families re-detect on the
    /// fixed content. Chunk and fixer failures are recorded on the result;
    /// only an invalid chunk plan or state transition is returned as `Err`.
    pub async fn run(
        &self,
        content: &str,
        file_path: &str,
        apply_fixes: bool,
        verifier: &mut DetectionVerifier,
    ) -> DomainResult<OrchestrationResult> {
        let family = self.family.name.as_str();

        if !self.family.applies_to(file_path) {
            tracing::debug!(family = family, file = file_path, "Family not applicable, skipping");
            return Ok(OrchestrationResult::skipped(family, file_path));
        }

        let start = Instant::now();
        let mut phases = vec![RunPhase::Pending];
        advance(&mut phases, RunPhase::Detecting)?;

        let detection = self.detect(content, file_path, verifier).await?;
        let mut errors = detection.errors;

        if detection.detectors_ok == 0 && !self.family.detectors.is_empty() {
            advance(&mut phases, RunPhase::Failed)?;
            tracing::warn!(
                family = family,
                file = file_path,
                errors = errors.len(),
                "Every detector failed"
            );
            return Ok(OrchestrationResult {
                family: family.to_string(),
                file: file_path.to_string(),
                status: RunStatus::Partial,
                verdict: Verdict::Fail,
                phases,
                issues: Vec::new(),
                unresolved: Vec::new(),
                fixes_applied: 0,
                triggers: self.family.triggers.clone(),
                errors,
                verification: Some(verifier.verify_family(family)),
                fixed_content: None,
            });
        }

        let issues = detection.issues;
        let fixable = issues.iter().any(|i| self.family.is_fixable(&i.rule));

        let (unresolved, fixes_applied, fixed_content) = if apply_fixes && fixable {
            advance(&mut phases, RunPhase::Fixing)?;
            let outcome = self.apply_fixers(content, &issues);
            errors.extend(outcome.errors);

            if self.family.validates {
                advance(&mut phases, RunPhase::Validating)?;
                let recheck = self.detect(&outcome.content, file_path, verifier).await?;
                errors.extend(recheck.errors);

                let remaining: HashSet<(&str, usize, &str, &str)> =
                    recheck.issues.iter().map(Issue::dedup_key).collect();
                let fixed = issues
                    .iter()
                    .filter(|i| !remaining.contains(&i.dedup_key()))
                    .count();
                (recheck.issues, fixed, Some(outcome.content))
            } else {
                let changed: HashSet<(&str, usize, &str, &str)> =
                    outcome.changed.iter().map(Issue::dedup_key).collect();
                let unresolved: Vec<Issue> = issues
                    .iter()
                    .filter(|i| !changed.contains(&i.dedup_key()))
                    .cloned()
                    .collect();
                (unresolved, outcome.changed.len(), Some(outcome.content))
            }
        } else {
            (issues.clone(), 0, None)
        };
        advance(&mut phases, RunPhase::Done)?;

        let verification = verifier.verify_family(family);
        let status = if errors.is_empty() && verification.is_verified {
            RunStatus::Done
        } else {
            RunStatus::Partial
        };
        let verdict = Verdict::from_issues(&unresolved);
        let triggers = self.triggers_for(&unresolved);
        let fixed_content = fixed_content.filter(|fixed| fixed != content);

        tracing::info!(
            family = family,
            file = file_path,
            issues = issues.len(),
            fixes = fixes_applied,
            unresolved = unresolved.len(),
            verdict = %verdict,
            status = %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Family run complete"
        );

        Ok(OrchestrationResult {
            family: family.to_string(),
            file: file_path.to_string(),
            status,
            verdict,
            phases,
            issues,
            unresolved,
            fixes_applied,
            triggers,
            errors,
            verification: Some(verification),
            fixed_content,
        })
    }

    /// Run every detector and record evidence for the ones that produced
    /// at least one successful chunk.
    async fn detect(
        &self,
        content: &str,
        file_path: &str,
        verifier: &mut DetectionVerifier,
    ) -> DomainResult<Detection> {
        let mut detection = Detection::default();

        for detector in &self.family.detectors {
            let chunks = match detector.scope() {
                DetectionScope::Chunked => self.chunker.create_chunks(file_path, content),
                DetectionScope::Document => vec![whole_document(file_path, content)],
            };
            let parallel = self.parallel && detector.scope() == DetectionScope::Chunked;

            let worker = Arc::clone(detector);
            let processor: ChunkProcessor =
                Arc::new(move |text: &str, path: &str, offset: usize| worker.detect(text, path, offset));

            let results = self.batch.process_chunks(chunks, processor, parallel).await?;
            let issues = BatchProcessor::merge_results(&results);
            let errors = BatchProcessor::collect_errors(&results);

            if results.iter().any(|r| !r.is_error()) {
                verifier.record_detection(
                    detector.name(),
                    1,
                    issues.len(),
                    detector.get_rules().into_keys().collect(),
                );
                detection.detectors_ok += 1;
            }

            detection
                .errors
                .extend(errors.into_iter().map(|e| format!("{}: {e}", detector.name())));
            detection.issues.extend(issues);
        }

        detection.issues = dedup_issues(detection.issues);
        Ok(detection)
    }

    /// Apply each fixer to the issues it owns, threading content through
    /// fixers in registration order.
    fn apply_fixers(&self, content: &str, issues: &[Issue]) -> FixOutcome {
        let mut current = content.to_string();
        let mut changed = Vec::new();
        let mut errors = Vec::new();

        for fixer in &self.family.fixers {
            let owned: Vec<Issue> = issues
                .iter()
                .filter(|i| fixer.handles(&i.rule))
                .cloned()
                .collect();
            if owned.is_empty() {
                continue;
            }

            let attempt = catch_unwind(AssertUnwindSafe(|| fixer.fix(&current, &owned)));
            match attempt {
                Ok(Ok(fixed)) => {
                    if fixed != current {
                        tracing::debug!(
                            fixer = fixer.name(),
                            issues = owned.len(),
                            "Fixer changed content"
                        );
                        current = fixed;
                        changed.extend(owned);
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(fixer = fixer.name(), error = %err, "Fixer failed");
                    errors.push(format!("{}: {err}", fixer.name()));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(fixer = fixer.name(), error = %message, "Fixer panicked");
                    errors.push(format!("{}: panicked: {message}", fixer.name()));
                }
            }
        }

        FixOutcome {
            content: current,
            changed,
            errors,
        }
    }

    /// Fixer names for fixable unresolved issues, then the family's own
    /// follow-on actions for the rest. Order-preserving, no duplicates.
    fn triggers_for(&self, unresolved: &[Issue]) -> Vec<String> {
        let mut triggers: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !triggers.iter().any(|t| t == name) {
                triggers.push(name.to_string());
            }
        };

        for issue in unresolved {
            match self.family.fixers.iter().find(|f| f.handles(&issue.rule)) {
                Some(fixer) => push(fixer.name()),
                None => self.family.triggers.iter().for_each(|t| push(t)),
            }
        }
        triggers
    }
}

fn advance(phases: &mut Vec<RunPhase>, next: RunPhase) -> DomainResult<()> {
    let current = phases.last().copied().unwrap_or(RunPhase::Pending);
    if !current.can_transition_to(next) {
        return Err(DomainError::InvalidStateTransition {
            from: current.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }
    phases.push(next);
    Ok(())
}

fn whole_document(file_path: &str, content: &str) -> Chunk {
    Chunk {
        file_path: file_path.to_string(),
        content: content.to_string(),
        start_line: 1,
        end_line: content.split_inclusive('\n').count().max(1),
        chunk_index: 0,
        total_chunks: 1,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
