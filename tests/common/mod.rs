//! Common test utilities for integration tests
//!
//! Shared fixtures for the orchestrator, lock and property tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use texguard::{Config, EngineContext, SuperOrchestrator};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Write `files` (relative path, content) under `root`, creating parents.
pub fn write_project(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(path, content).expect("Failed to write fixture");
    }
}

pub fn orchestrator(config: Config) -> SuperOrchestrator {
    let context = EngineContext::new(config).expect("Failed to build engine context");
    SuperOrchestrator::new(Arc::new(context))
}

/// A chapter with one defect per fixable family plus an unfixable one.
pub const CHAPTER: &str = "\
\\section{מבוא}
שלום API עולם
ראו את המקור \\cite{knuth84}.
\\begin{table}
\\caption{תוצאות}
\\begin{tabular}{lc}
a & b \\\\
\\end{tabular}
\\end{table}
\\begin{lstlisting}
\tint x = 1;
\\end{lstlisting}
";

/// Bibliography with a duplicate key (case-insensitive).
pub const REFS: &str = "\
@book{knuth84,
  title = {The TeXbook}
}
@book{Knuth84,
  title = {Duplicate}
}
";

/// A build log with an overfull box above the default threshold.
pub const BUILD_LOG: &str = "\
This is pdfTeX
Overfull \\hbox (24.1pt too wide) in paragraph at lines 12--14
Underfull \\hbox (badness 10000) in paragraph at lines 20--21
";

/// `n` lines of mixed Hebrew prose with a bare English term every
/// `every` lines.
pub fn long_document(n: usize, every: usize) -> String {
    (1..=n)
        .map(|i| {
            if i % every == 0 {
                format!("שורה {i} עם Term{i} באמצע\n")
            } else {
                format!("שורה {i} בעברית בלבד\n")
            }
        })
        .collect()
}
