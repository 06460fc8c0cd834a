//! Detector port.

use crate::domain::models::Issue;
use anyhow::Result;
use std::collections::BTreeMap;

/// How a detector must be fed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionScope {
    /// Safe to run over overlapping line windows.
    #[default]
    Chunked,
    /// Needs the whole document (e.g. rules comparing distant lines).
    Document,
}

/// Port for rule detectors following hexagonal architecture
///
/// A detector is a pure function of its inputs: the same content, path and
/// offset always produce the same issues, in the same order. It must not
/// modify the content it inspects.
///
/// # Examples
///
/// ```no_run
/// use texguard::domain::ports::Detector;
/// use anyhow::Result;
///
/// fn example(detector: &dyn Detector, content: &str) -> Result<()> {
///     // Chunk starting at line 501 of the original file
///     let issues = detector.detect(content, "chapter1.tex", 500)?;
///     for issue in issues {
///         assert!(issue.line > 500);
///     }
///     Ok(())
/// }
/// ```
pub trait Detector: Send + Sync {
    /// Stable detector name, used as the evidence key
    /// (e.g. `"BiDiDetector"`).
    fn name(&self) -> &str;

    /// Find issues in `content`.
    ///
    /// # Arguments
    ///
    /// * `content` - Text to inspect (a whole file or one chunk of it)
    /// * `file_path` - Path used for reporting
    /// * `offset` - Added to every chunk-local line number so reported
    ///   lines are in the original file's coordinates
    fn detect(&self, content: &str, file_path: &str, offset: usize) -> Result<Vec<Issue>>;

    /// Rules this detector checks, keyed by rule id.
    fn get_rules(&self) -> BTreeMap<String, String>;

    /// Whether the detector may run over chunks.
    fn scope(&self) -> DetectionScope {
        DetectionScope::Chunked
    }
}
