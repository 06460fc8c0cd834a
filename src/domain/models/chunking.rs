//! Document chunking domain models
//!
//! Models for splitting a document into overlapping line windows so that
//! detectors can run over large files in parallel. All line numbers are
//! 1-based and expressed in the original document's coordinates.

use serde::{Deserialize, Serialize};

use super::issue::Issue;

/// Configuration for document chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChunkingConfig {
    /// Number of lines each chunk advances by
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Lines shared between consecutive chunks, so a match spanning a
    /// boundary is still seen whole in at least one chunk
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

const fn default_chunk_size() -> usize {
    500
}

const fn default_overlap() -> usize {
    10
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    /// Config with explicit sizes.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Validate the chunking configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.overlap >= self.chunk_size {
            return Err("overlap must be less than chunk_size".to_string());
        }

        Ok(())
    }
}

/// A contiguous, possibly overlapping window of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Path of the document this chunk was cut from
    pub file_path: String,

    /// The text of lines `start_line..=end_line`
    pub content: String,

    /// First line of the window (1-based, inclusive)
    pub start_line: usize,

    /// Last line of the window (1-based, inclusive)
    pub end_line: usize,

    /// Position of this chunk within the file (0-based)
    pub chunk_index: usize,

    /// Number of chunks the file was split into
    pub total_chunks: usize,
}

impl Chunk {
    /// Offset to add to chunk-local line numbers.
    pub fn line_offset(&self) -> usize {
        self.start_line.saturating_sub(1)
    }

    /// Number of lines covered by this chunk
    pub fn line_count(&self) -> usize {
        (self.end_line + 1).saturating_sub(self.start_line)
    }

    /// Whether this is the first chunk of its file.
    pub fn is_first(&self) -> bool {
        self.chunk_index == 0
    }

    /// Whether this is the last chunk of its file.
    pub fn is_last(&self) -> bool {
        self.chunk_index + 1 == self.total_chunks
    }
}

/// Outcome of running one processor over one [`Chunk`].
///
/// A failed chunk carries only its error; it contributes no issues to a
/// merge.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    /// The chunk processed.
    pub chunk: Chunk,
    /// Issues with document-global line numbers, or the failure message.
    pub outcome: Result<Vec<Issue>, String>,
}

impl ChunkResult {
    /// A chunk that produced `issues`.
    pub fn success(chunk: Chunk, issues: Vec<Issue>) -> Self {
        Self {
            chunk,
            outcome: Ok(issues),
        }
    }

    /// A chunk whose processor failed.
    pub fn failure(chunk: Chunk, error: impl Into<String>) -> Self {
        Self {
            chunk,
            outcome: Err(error.into()),
        }
    }

    /// Issues found, empty when the chunk failed.
    pub fn issues(&self) -> &[Issue] {
        match &self.outcome {
            Ok(issues) => issues,
            Err(_) => &[],
        }
    }

    /// Failure message, if the chunk failed.
    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    /// Whether the chunk failed.
    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Severity;

    fn chunk(start: usize, end: usize, index: usize, total: usize) -> Chunk {
        Chunk {
            file_path: "doc.tex".to_string(),
            content: String::new(),
            start_line: start,
            end_line: end,
            chunk_index: index,
            total_chunks: total,
        }
    }

    #[test]
    fn test_chunking_config_default() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.overlap, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunking_config_validation() {
        assert!(ChunkingConfig::new(0, 0).validate().is_err());
        assert!(ChunkingConfig::new(10, 10).validate().is_err());
        assert!(ChunkingConfig::new(10, 0).validate().is_ok());
    }

    #[test]
    fn test_chunk_offsets() {
        let c = chunk(501, 1010, 1, 3);
        assert_eq!(c.line_offset(), 500);
        assert_eq!(c.line_count(), 510);
        assert!(!c.is_first());
        assert!(!c.is_last());
        assert!(chunk(1001, 1050, 2, 3).is_last());
    }

    #[test]
    fn test_failed_chunk_has_no_issues() {
        let failed = ChunkResult::failure(chunk(1, 10, 0, 1), "boom");
        assert!(failed.is_error());
        assert!(failed.issues().is_empty());
        assert_eq!(failed.error(), Some("boom"));

        let ok = ChunkResult::success(
            chunk(1, 10, 0, 1),
            vec![Issue::new("x", "doc.tex", 2, "y", Severity::Info)],
        );
        assert_eq!(ok.issues().len(), 1);
        assert!(ok.error().is_none());
    }
}
