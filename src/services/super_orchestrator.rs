//! Super orchestrator.
//!
//! Fans one file out to the selected rule families, and a project out to
//! its files. Families run one after another per file, each seeing the
//! content as fixed by the families before it; files in a project run
//! concurrently, bounded by `batch.max_workers`.

use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    FileFailure, OrchestrationResult, ProjectResult, RunStatus, SuperResult, Verdict,
};
use crate::services::context::EngineContext;
use crate::services::detection_verifier::DetectionVerifier;
use crate::services::family_orchestrator::{FamilyDefinition, FamilyOrchestrator};

/// Agent id used when the caller does not name one.
pub const DEFAULT_AGENT_ID: &str = "texguard";

/// Runs families over files and projects.
#[derive(Debug, Clone)]
pub struct SuperOrchestrator {
    context: Arc<EngineContext>,
}

/// A family chosen for a run, or skipped because configuration disables it.
enum Selected<'a> {
    Run(&'a FamilyDefinition),
    Disabled(&'a str),
}

impl SuperOrchestrator {
    /// Orchestrator over the families of `context`.
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self { context }
    }

    /// The shared engine context.
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Resolve the family selection.
    ///
    /// An explicit list runs exactly those families, in the given order.
    /// Without one, every catalog family runs if enabled by configuration
    /// and is reported as skipped otherwise.
    fn select(&self, families: Option<&[String]>) -> DomainResult<Vec<Selected<'_>>> {
        let catalog = self.context.catalog();

        match families {
            Some(names) => names
                .iter()
                .map(|name| {
                    catalog
                        .get(name)
                        .map(Selected::Run)
                        .ok_or_else(|| DomainError::UnknownFamily(name.clone()))
                })
                .collect(),
            None => Ok(catalog
                .iter()
                .map(|family| {
                    if self.context.is_enabled(&family.name) {
                        Selected::Run(family)
                    } else {
                        Selected::Disabled(&family.name)
                    }
                })
                .collect()),
        }
    }

    fn orchestrator_for(&self, family: &FamilyDefinition) -> FamilyOrchestrator {
        FamilyOrchestrator::new(family.clone())
            .with_chunker(self.context.chunker().clone())
            .with_batch(
                self.context.batch_processor(),
                self.context.config().batch.parallel,
            )
    }

    /// Run the selected families over one file's content.
    ///
    /// Unknown family names fail before anything runs. Every run gets a
    /// fresh [`DetectionVerifier`].
    pub async fn run(
        &self,
        content: &str,
        file_path: &str,
        families: Option<&[String]>,
        apply_fixes: bool,
    ) -> DomainResult<SuperResult> {
        let selected = self.select(families)?;
        let mut verifier = DetectionVerifier::new();
        let mut current = content.to_string();
        let mut results: Vec<OrchestrationResult> = Vec::with_capacity(selected.len());

        for choice in selected {
            let result = match choice {
                Selected::Disabled(name) => {
                    tracing::debug!(family = name, file = file_path, "Family disabled, skipping");
                    OrchestrationResult::skipped(name, file_path)
                }
                Selected::Run(family) => {
                    let result = self
                        .orchestrator_for(family)
                        .run(&current, file_path, apply_fixes, &mut verifier)
                        .await?;
                    if let Some(fixed) = &result.fixed_content {
                        current.clone_from(fixed);
                    }
                    result
                }
            };
            results.push(result);
        }

        let verification: BTreeMap<_, _> = results
            .iter()
            .filter(|r| r.status != RunStatus::Skip)
            .map(|r| (r.family.clone(), verifier.verify_family(&r.family)))
            .collect();

        let status = results
            .iter()
            .map(|r| r.status)
            .fold(RunStatus::Skip, RunStatus::combine);
        let verdict = results
            .iter()
            .map(|r| r.verdict)
            .max()
            .unwrap_or(Verdict::Pass);
        let content_changed = current != content;

        Ok(SuperResult {
            file: file_path.to_string(),
            status,
            verdict,
            total_issues: results.iter().map(|r| r.issues.len()).sum(),
            total_fixes: results.iter().map(|r| r.fixes_applied).sum(),
            families: results,
            verification,
            content: current,
            content_changed,
        })
    }

    /// Run over every matching file under `root`.
    ///
    /// With `apply_fixes`, `root` is locked for `agent_id` for the whole
    /// run and changed files are written back. A file that cannot be read,
    /// checked or written is recorded in `failures` and the run continues.
    pub async fn run_on_project(
        &self,
        root: &Path,
        families: Option<&[String]>,
        apply_fixes: bool,
        agent_id: &str,
    ) -> DomainResult<ProjectResult> {
        // Fail fast on a bad selection rather than once per file.
        self.select(families)?;

        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let root_key = root.display().to_string();
        tracing::info!(run_id = %run_id, root = %root_key, apply_fixes, "Project run started");

        let _guard = if apply_fixes {
            let locking = &self.context.config().locking;
            // Reported for an operator to act on; never reclaimed here.
            self.context
                .resources()
                .get_stale_locks(Duration::from_secs(locking.stale_after_secs));

            let timeout = Duration::from_secs(locking.acquire_timeout_secs);
            Some(
                self.context
                    .resources()
                    .lock(&root_key, agent_id, timeout)
                    .await?,
            )
        } else {
            None
        };

        let (paths, mut failures) = self.collect_files(root)?;
        let workers = self.context.config().batch.max_workers.max(1);

        let outcomes: Vec<Result<SuperResult, FileFailure>> = stream::iter(paths)
            .map(|path| self.process_file(root, path, families, apply_fixes))
            .buffered(workers)
            .collect()
            .await;

        let mut files = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(result) => files.push(result),
                Err(failure) => failures.push(failure),
            }
        }

        let mut status = files
            .iter()
            .map(|f| f.status)
            .fold(RunStatus::Skip, RunStatus::combine);
        if !failures.is_empty() {
            status = RunStatus::Partial;
        }
        let verdict = files.iter().map(|f| f.verdict).max().unwrap_or(Verdict::Pass);

        let result = ProjectResult {
            run_id,
            root: root_key,
            status,
            verdict,
            files_scanned: files.len(),
            total_issues: files.iter().map(|f| f.total_issues).sum(),
            total_fixes: files.iter().map(|f| f.total_fixes).sum(),
            files,
            failures,
        };

        tracing::info!(
            run_id = %result.run_id,
            root = %result.root,
            files = result.files_scanned,
            failures = result.failures.len(),
            issues = result.total_issues,
            fixes = result.total_fixes,
            verdict = %result.verdict,
            status = %result.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Project run complete"
        );

        Ok(result)
    }

    async fn process_file(
        &self,
        root: &Path,
        path: PathBuf,
        families: Option<&[String]>,
        apply_fixes: bool,
    ) -> Result<SuperResult, FileFailure> {
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path.as_path())
            .to_string_lossy()
            .into_owned();
        let fail = |error: String| {
            tracing::warn!(file = %relative, error = %error, "File failed");
            FileFailure {
                file: relative.clone(),
                error,
            }
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| fail(format!("read failed: {e}")))?;

        let result = self
            .run(&content, &relative, families, apply_fixes)
            .await
            .map_err(|e| fail(e.to_string()))?;

        if apply_fixes && result.content_changed {
            tokio::fs::write(&path, &result.content)
                .await
                .map_err(|e| fail(format!("write failed: {e}")))?;
            tracing::info!(file = %relative, fixes = result.total_fixes, "Wrote fixed file");
        }

        Ok(result)
    }

    /// Files under `root` matching the configured include patterns and no
    /// exclude pattern, sorted by path. Hidden directories are not entered.
    /// Unreadable directory entries are returned as failures.
    fn collect_files(&self, root: &Path) -> DomainResult<(Vec<PathBuf>, Vec<FileFailure>)> {
        let project = &self.context.config().project;
        let include = build_globset(&project.include)?;
        let exclude = build_globset(&project.exclude)?;

        let mut paths = Vec::new();
        let mut failures = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let file = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    failures.push(FileFailure {
                        file,
                        error: err.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if include.is_match(relative) && !exclude.is_match(relative) {
                paths.push(entry.into_path());
            }
        }

        paths.sort();
        tracing::debug!(root = %root.display(), files = paths.len(), "Collected project files");
        Ok((paths, failures))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

/// Compile glob patterns into one matcher.
pub fn build_globset(patterns: &[String]) -> DomainResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| DomainError::InvalidGlob(format!("{pattern}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| DomainError::InvalidGlob(e.to_string()))
}
