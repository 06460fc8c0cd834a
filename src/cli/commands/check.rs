//! `texguard check`: run the rule families over a file or a project.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::output::{
    list_table, output, severity_cell, styled_verdict, truncate, verdict_cell, CommandOutput,
};
use crate::domain::models::{Config, ProjectResult, SuperResult, Verdict};
use crate::infrastructure::lockfile::ProjectLock;
use crate::services::{EngineContext, SuperOrchestrator, DEFAULT_AGENT_ID};

/// Arguments of `texguard check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// File or project directory to check
    pub path: PathBuf,

    /// Run only this family (repeatable)
    #[arg(short, long = "family", value_name = "NAME")]
    pub families: Vec<String>,

    /// Apply automatic fixes and write changed files back
    #[arg(long)]
    pub fix: bool,

    /// Agent id that holds the lock while fixing
    #[arg(long, default_value = DEFAULT_AGENT_ID)]
    pub agent_id: String,
}

/// Report for a single file.
#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct FileCheckOutput(pub SuperResult);

impl CommandOutput for FileCheckOutput {
    fn to_human(&self) -> String {
        let result = &self.0;
        let mut lines = vec![format!(
            "{}: {} ({} issue(s), {} fix(es) applied)",
            result.file,
            styled_verdict(result.verdict),
            result.total_issues,
            result.total_fixes
        )];

        let mut families = list_table(&["family", "status", "verdict", "issues", "fixes", "triggers"]);
        for family in &result.families {
            families.add_row(vec![
                Cell::new(&family.family),
                Cell::new(family.status.as_str()),
                verdict_cell(family.verdict),
                Cell::new(family.issues.len()),
                Cell::new(family.fixes_applied),
                Cell::new(family.triggers.join(", ")),
            ]);
        }
        lines.push(families.to_string());

        let unresolved: Vec<_> = result.unresolved().collect();
        if !unresolved.is_empty() {
            let mut issues = list_table(&["line", "severity", "rule", "content"]);
            for issue in unresolved {
                issues.add_row(vec![
                    Cell::new(issue.line),
                    severity_cell(issue.severity),
                    Cell::new(&issue.rule),
                    Cell::new(truncate(&issue.content, 60)),
                ]);
            }
            lines.push(String::new());
            lines.push(issues.to_string());
        }

        for family in &result.families {
            for error in &family.errors {
                lines.push(format!("error [{}]: {error}", family.family));
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.to_dict())
    }
}

/// Report for a project directory.
#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct ProjectCheckOutput(pub ProjectResult);

impl CommandOutput for ProjectCheckOutput {
    fn to_human(&self) -> String {
        let result = &self.0;
        let mut lines = vec![format!(
            "{}: {} ({} file(s), {} issue(s), {} fix(es) applied, status {})",
            result.root,
            styled_verdict(result.verdict),
            result.files_scanned,
            result.total_issues,
            result.total_fixes,
            result.status
        )];

        let flagged: Vec<_> = result
            .files
            .iter()
            .filter(|f| f.total_issues > 0 || f.total_fixes > 0)
            .collect();
        if !flagged.is_empty() {
            let mut table = list_table(&["file", "verdict", "issues", "fixes"]);
            for file in flagged {
                table.add_row(vec![
                    Cell::new(&file.file),
                    verdict_cell(file.verdict),
                    Cell::new(file.total_issues),
                    Cell::new(file.total_fixes),
                ]);
            }
            lines.push(table.to_string());
        }

        if !result.failures.is_empty() {
            lines.push(format!("\n{} file(s) failed:", result.failures.len()));
            for failure in &result.failures {
                lines.push(format!("  - {}: {}", failure.file, failure.error));
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.to_dict())
    }
}

/// Run the check and print its report. Returns the overall verdict.
///
/// With `--fix`, the checked directory (a file's parent directory) is
/// locked against other texguard processes for the whole run.
pub async fn execute(args: CheckArgs, config: Config, json_mode: bool) -> Result<Verdict> {
    let context = Arc::new(EngineContext::new(config)?);
    let orchestrator = SuperOrchestrator::new(Arc::clone(&context));
    let families = (!args.families.is_empty()).then_some(args.families.as_slice());
    let timeout = Duration::from_secs(context.config().locking.acquire_timeout_secs);

    let _project_lock = if args.fix {
        let root = lock_root(&args.path);
        Some(
            ProjectLock::acquire(&root, &args.agent_id, timeout)
                .await
                .with_context(|| format!("Failed to lock {} for fixing", root.display()))?,
        )
    } else {
        None
    };

    if args.path.is_dir() {
        let result = orchestrator
            .run_on_project(&args.path, families, args.fix, &args.agent_id)
            .await?;
        let verdict = result.verdict;
        output(&ProjectCheckOutput(result), json_mode);
        return Ok(verdict);
    }

    let file = args.path.display().to_string();
    let content = tokio::fs::read_to_string(&args.path)
        .await
        .with_context(|| format!("Failed to read {file}"))?;

    let _guard = if args.fix {
        Some(context.resources().lock(&file, &args.agent_id, timeout).await?)
    } else {
        None
    };

    let result = orchestrator.run(&content, &file, families, args.fix).await?;
    if args.fix && result.content_changed {
        tokio::fs::write(&args.path, &result.content)
            .await
            .with_context(|| format!("Failed to write {file}"))?;
        tracing::info!(file = %file, fixes = result.total_fixes, "Wrote fixed file");
    }

    let verdict = result.verdict;
    output(&FileCheckOutput(result), json_mode);
    Ok(verdict)
}

/// Directory whose lock file guards fixes to `path`.
fn lock_root(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(path: PathBuf, fix: bool) -> CheckArgs {
        CheckArgs {
            path,
            families: vec![],
            fix,
            agent_id: DEFAULT_AGENT_ID.to_string(),
        }
    }

    #[tokio::test]
    async fn test_check_file_with_fix_writes_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chapter.tex");
        std::fs::write(&path, "\\begin{lstlisting}\n\tx = 1\n\\end{lstlisting}\n").unwrap();

        let verdict = execute(args(path.clone(), true), Config::default(), true)
            .await
            .unwrap();

        assert_eq!(verdict, Verdict::Pass);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("    x = 1"));
    }

    #[tokio::test]
    async fn test_check_project_reports_worst_verdict() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.tex"), "Plain text.\n").unwrap();
        std::fs::write(
            dir.path().join("refs.bib"),
            "@book{knuth,\n  title={A}\n}\n@book{Knuth,\n  title={B}\n}\n",
        )
        .unwrap();

        let verdict = execute(args(dir.path().to_path_buf(), false), Config::default(), true)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_fix_refused_while_another_process_holds_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chapter.tex");
        let original = "\\begin{lstlisting}\n\tx = 1\n\\end{lstlisting}\n";
        std::fs::write(&path, original).unwrap();
        let held = ProjectLock::acquire(dir.path(), "other-process", Duration::ZERO)
            .await
            .unwrap();

        let mut config = Config::default();
        config.locking.acquire_timeout_secs = 0;
        let err = execute(args(path.clone(), true), config.clone(), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to lock"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

        // Checking without fixes needs no lock.
        execute(args(path.clone(), false), config.clone(), true).await.unwrap();

        drop(held);
        execute(args(path.clone(), true), config, true).await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("    x = 1"));
        assert!(!ProjectLock::path_for(dir.path()).exists());
    }

    #[test]
    fn test_lock_root() {
        assert_eq!(lock_root(Path::new("paper.tex")), PathBuf::from("."));
        assert_eq!(lock_root(Path::new("/nonexistent/ch/a.tex")), PathBuf::from("/nonexistent/ch"));
    }

    #[tokio::test]
    async fn test_check_missing_file_is_error() {
        let result = execute(
            args(PathBuf::from("/nonexistent/paper.tex"), false),
            Config::default(),
            true,
        )
        .await;
        assert!(result.is_err());
    }
}
