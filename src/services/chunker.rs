//! Line-window chunking service
//!
//! Splits a document into overlapping line windows. Each chunk starts
//! `chunk_size` lines after the previous one and extends `overlap` lines
//! further, so consecutive chunks share `overlap` lines and a match that
//! straddles a boundary is still seen whole by one of them.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Chunk, ChunkingConfig};

/// Line-based document chunker
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a chunker with the default 500-line windows and 10-line overlap
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chunker with custom configuration
    pub fn with_config(config: ChunkingConfig) -> DomainResult<Self> {
        config.validate().map_err(DomainError::InvalidChunk)?;
        Ok(Self { config })
    }

    /// The chunking parameters in use.
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split `content` into chunks.
    ///
    /// Files with at most `chunk_size` lines come back as exactly one chunk.
    /// Larger files produce `ceil(total_lines / chunk_size)` chunks; the last
    /// one is clamped to the end of the file.
    pub fn create_chunks(&self, file_path: &str, content: &str) -> Vec<Chunk> {
        // Keep line terminators so a chunk's content is a verbatim slice.
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let total_lines = lines.len();
        let chunk_size = self.config.chunk_size;

        if total_lines <= chunk_size {
            return vec![Chunk {
                file_path: file_path.to_string(),
                content: content.to_string(),
                start_line: 1,
                end_line: total_lines.max(1),
                chunk_index: 0,
                total_chunks: 1,
            }];
        }

        let total_chunks = total_lines.div_ceil(chunk_size);
        let window = chunk_size + self.config.overlap;

        let chunks: Vec<Chunk> = (0..total_chunks)
            .map(|chunk_index| {
                let start = chunk_index * chunk_size;
                let end = (start + window).min(total_lines);
                Chunk {
                    file_path: file_path.to_string(),
                    content: lines[start..end].concat(),
                    start_line: start + 1,
                    end_line: end,
                    chunk_index,
                    total_chunks,
                }
            })
            .collect();

        tracing::debug!(
            file = file_path,
            total_lines = total_lines,
            chunk_count = chunks.len(),
            chunk_size = chunk_size,
            overlap = self.config.overlap,
            "Created chunks"
        );

        chunks
    }
}
