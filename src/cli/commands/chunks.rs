//! `texguard chunks`: show the chunk plan for a file.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use std::path::PathBuf;

use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::{Chunk, Config};
use crate::services::Chunker;

/// Arguments of `texguard chunks`.
#[derive(Args, Debug)]
pub struct ChunksArgs {
    /// File to split
    pub file: PathBuf,
}

/// One planned chunk.
#[derive(Debug, serde::Serialize)]
pub struct ChunkRow {
    /// 0-based chunk index.
    pub index: usize,
    /// First line, 1-based.
    pub start_line: usize,
    /// Last line, inclusive.
    pub end_line: usize,
    /// Number of lines covered.
    pub lines: usize,
}

impl From<&Chunk> for ChunkRow {
    fn from(chunk: &Chunk) -> Self {
        Self {
            index: chunk.chunk_index,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            lines: chunk.end_line + 1 - chunk.start_line,
        }
    }
}

/// The chunk plan for a file.
#[derive(Debug, serde::Serialize)]
pub struct ChunkPlanOutput {
    /// File the plan is for.
    pub file: String,
    /// Lines per chunk before overlap.
    pub chunk_size: usize,
    /// Lines shared with the next chunk.
    pub overlap: usize,
    /// Planned chunks, in order.
    pub chunks: Vec<ChunkRow>,
}

impl CommandOutput for ChunkPlanOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["index", "start", "end", "lines"]);
        for chunk in &self.chunks {
            table.add_row(vec![
                Cell::new(chunk.index),
                Cell::new(chunk.start_line),
                Cell::new(chunk.end_line),
                Cell::new(chunk.lines),
            ]);
        }
        format!(
            "{}: {} chunk(s) (chunk_size {}, overlap {})\n{table}",
            self.file,
            self.chunks.len(),
            self.chunk_size,
            self.overlap
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Chunk plan for `content` under `config`'s chunking settings.
pub fn plan(file: &str, content: &str, config: &Config) -> Result<ChunkPlanOutput> {
    let chunker = Chunker::with_config(config.chunking.clone())?;
    let chunks = chunker.create_chunks(file, content);
    Ok(ChunkPlanOutput {
        file: file.to_string(),
        chunk_size: config.chunking.chunk_size,
        overlap: config.chunking.overlap,
        chunks: chunks.iter().map(ChunkRow::from).collect(),
    })
}

/// Print the chunk plan for `args.file`.
pub async fn execute(args: ChunksArgs, config: &Config, json_mode: bool) -> Result<()> {
    let file = args.file.display().to_string();
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {file}"))?;

    output(&plan(&file, &content, config)?, json_mode);
    Ok(())
}
