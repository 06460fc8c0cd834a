//! Batch processor for parallel chunk detection.
//!
//! Dispatches a chunk processor (usually a detector's `detect`) across a
//! chunk set on a bounded worker pool, then merges the per-chunk results
//! into one deduplicated, ordered issue list.
//!
//! ## Ordering
//!
//! Workers complete in any order. Results are re-sorted by
//! `(file_path, chunk_index)` before they are returned, and
//! [`BatchProcessor::merge_results`] sorts issues by `(file, line)`, so the
//! output is reproducible for the same input.
//!
//! ## Failure isolation
//!
//! A processor error or panic is caught and recorded on that chunk's
//! [`ChunkResult`]; it never aborts the batch. An invalid chunk list fails
//! the whole call up front.

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Chunk, ChunkResult, Issue};

/// A content -> issues function applied to each chunk.
///
/// Called as `processor(content, file_path, offset)` where `offset` is
/// `chunk.start_line - 1`.
pub type ChunkProcessor =
    Arc<dyn Fn(&str, &str, usize) -> anyhow::Result<Vec<Issue>> + Send + Sync>;

/// Default number of concurrent chunk workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

// ---------------------------------------------------------------------------
// BatchProcessor
// ---------------------------------------------------------------------------

/// Drives a [`ChunkProcessor`] over chunks, in parallel or in order.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    max_workers: usize,
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

impl BatchProcessor {
    /// Create a processor with at most `max_workers` chunks in flight.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Worker bound for parallel runs.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `processor` over every chunk.
    ///
    /// With `parallel` set and more than one chunk, chunks are dispatched to
    /// the worker pool and collected as they complete; otherwise they are
    /// processed strictly in order on the calling task. Either way the
    /// returned results are ordered by `(file_path, chunk_index)`.
    pub async fn process_chunks(
        &self,
        chunks: Vec<Chunk>,
        processor: ChunkProcessor,
        parallel: bool,
    ) -> DomainResult<Vec<ChunkResult>> {
        validate_chunks(&chunks)?;

        let start = Instant::now();
        let chunk_count = chunks.len();

        let mut results = if parallel && chunk_count > 1 {
            self.process_parallel(chunks, processor).await
        } else {
            chunks
                .into_iter()
                .map(|chunk| run_chunk(chunk, processor.as_ref()))
                .collect()
        };

        results.sort_by(|a, b| {
            a.chunk
                .file_path
                .cmp(&b.chunk.file_path)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });

        let failed = results.iter().filter(|r| r.is_error()).count();
        tracing::debug!(
            chunk_count = chunk_count,
            failed = failed,
            parallel = parallel,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch processing complete"
        );

        Ok(results)
    }

    async fn process_parallel(
        &self,
        chunks: Vec<Chunk>,
        processor: ChunkProcessor,
    ) -> Vec<ChunkResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut pending = FuturesUnordered::new();

        for chunk in chunks {
            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(&processor);
            let fallback = chunk.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                tokio::task::spawn_blocking(move || run_chunk(chunk, processor.as_ref())).await
            });

            pending.push(handle.map(move |joined| match joined {
                Ok(Ok(result)) => result,
                Ok(Err(err)) | Err(err) => {
                    tracing::warn!(
                        file = %fallback.file_path,
                        chunk_index = fallback.chunk_index,
                        error = %err,
                        "Chunk worker did not complete"
                    );
                    ChunkResult::failure(fallback, format!("worker did not complete: {err}"))
                }
            }));
        }

        let mut results = Vec::new();
        while let Some(result) = pending.next().await {
            results.push(result);
        }
        results
    }

    /// Merge chunk results into one issue list.
    ///
    /// Failed chunks are skipped. Issues are deduplicated on
    /// `(file, line, rule, content)`, which collapses matches seen twice in
    /// an overlap window, and returned sorted by `(file, line)`.
    pub fn merge_results(results: &[ChunkResult]) -> Vec<Issue> {
        dedup_issues(
            results
                .iter()
                .filter(|r| !r.is_error())
                .flat_map(|r| r.issues().iter().cloned()),
        )
    }

    /// Error messages of failed chunks, prefixed with their location.
    pub fn collect_errors(results: &[ChunkResult]) -> Vec<String> {
        results
            .iter()
            .filter_map(|r| {
                r.error().map(|e| {
                    format!(
                        "{} (lines {}-{}, chunk {}): {}",
                        r.chunk.file_path, r.chunk.start_line, r.chunk.end_line, r.chunk.chunk_index, e
                    )
                })
            })
            .collect()
    }
}

/// Deduplicate issues on their `(file, line, rule, content)` key and sort
/// by `(file, line)`. First occurrence wins; the sort is stable.
pub fn dedup_issues(issues: impl IntoIterator<Item = Issue>) -> Vec<Issue> {
    let mut seen: HashSet<(String, usize, String, String)> = HashSet::new();
    let mut merged: Vec<Issue> = issues
        .into_iter()
        .filter(|issue| {
            let (file, line, rule, content) = issue.dedup_key();
            seen.insert((file.to_string(), line, rule.to_string(), content.to_string()))
        })
        .collect();

    merged.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    merged
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run the processor over one chunk, capturing errors and panics.
fn run_chunk(
    chunk: Chunk,
    processor: &(dyn Fn(&str, &str, usize) -> anyhow::Result<Vec<Issue>> + Send + Sync),
) -> ChunkResult {
    let offset = chunk.line_offset();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        processor(&chunk.content, &chunk.file_path, offset)
    }));

    match outcome {
        Ok(Ok(issues)) => ChunkResult::success(chunk, issues),
        Ok(Err(err)) => {
            tracing::warn!(
                file = %chunk.file_path,
                chunk_index = chunk.chunk_index,
                error = %err,
                "Chunk processing failed; excluding from merge"
            );
            let message = format!("{err:#}");
            ChunkResult::failure(chunk, message)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(
                file = %chunk.file_path,
                chunk_index = chunk.chunk_index,
                error = %message,
                "Chunk processor panicked; excluding from merge"
            );
            ChunkResult::failure(chunk, format!("processor panicked: {message}"))
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Reject chunk lists no chunker could have produced.
fn validate_chunks(chunks: &[Chunk]) -> DomainResult<()> {
    let mut indices = HashSet::new();

    for chunk in chunks {
        if chunk.start_line == 0 {
            return Err(DomainError::InvalidChunk(format!(
                "{} chunk {}: start_line must be 1-based",
                chunk.file_path, chunk.chunk_index
            )));
        }
        if chunk.end_line < chunk.start_line {
            return Err(DomainError::InvalidChunk(format!(
                "{} chunk {}: end_line {} precedes start_line {}",
                chunk.file_path, chunk.chunk_index, chunk.end_line, chunk.start_line
            )));
        }
        if chunk.chunk_index >= chunk.total_chunks {
            return Err(DomainError::InvalidChunk(format!(
                "{} chunk {}: index out of range for {} chunks",
                chunk.file_path, chunk.chunk_index, chunk.total_chunks
            )));
        }
        if !indices.insert((chunk.file_path.as_str(), chunk.chunk_index)) {
            return Err(DomainError::InvalidChunk(format!(
                "{} chunk {} appears more than once",
                chunk.file_path, chunk.chunk_index
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Severity;
    use std::time::Duration;

    fn chunk(index: usize, start: usize, end: usize, total: usize, content: &str) -> Chunk {
        Chunk {
            file_path: "a.tex".to_string(),
            content: content.to_string(),
            start_line: start,
            end_line: end,
            chunk_index: index,
            total_chunks: total,
        }
    }

    /// Reports every line containing "bad".
    fn bad_line_processor() -> ChunkProcessor {
        Arc::new(|content: &str, file: &str, offset: usize| -> anyhow::Result<Vec<Issue>> {
            Ok(content
                .lines()
                .enumerate()
                .filter(|(_, l)| l.contains("bad"))
                .map(|(i, l)| Issue::new("bad-word", file, i + 1 + offset, l, Severity::Warning))
                .collect())
        })
    }

    #[tokio::test]
    async fn test_offsets_translate_to_global_lines() {
        let chunks = vec![
            chunk(0, 1, 3, 2, "ok\nbad\nok\n"),
            chunk(1, 3, 5, 2, "ok\nok\nbad\n"),
        ];
        let results = BatchProcessor::default()
            .process_chunks(chunks, bad_line_processor(), false)
            .await
            .unwrap();
        let merged = BatchProcessor::merge_results(&results);

        assert_eq!(merged.iter().map(|i| i.line).collect::<Vec<_>>(), vec![2, 5]);
    }

    #[tokio::test]
    async fn test_overlap_duplicates_collapse() {
        // Line 505 is inside both windows.
        let a = chunk(0, 1, 510, 2, "");
        let b = chunk(1, 501, 1010, 2, "");
        let issue = Issue::new("x", "a.tex", 505, "y", Severity::Info);
        let results = vec![
            ChunkResult::success(a, vec![issue.clone()]),
            ChunkResult::success(b, vec![issue.clone()]),
        ];

        let merged = BatchProcessor::merge_results(&results);
        assert_eq!(merged, vec![issue]);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_isolated() {
        let processor: ChunkProcessor = Arc::new(|content: &str, file: &str, offset: usize| -> anyhow::Result<Vec<Issue>> {
            if content.contains("explode") {
                anyhow::bail!("rule crashed");
            }
            Ok(vec![Issue::new("r", file, offset + 1, content.trim(), Severity::Info)])
        });
        let chunks = vec![
            chunk(0, 1, 1, 3, "first\n"),
            chunk(1, 2, 2, 3, "explode\n"),
            chunk(2, 3, 3, 3, "third\n"),
        ];

        let results = BatchProcessor::new(2)
            .process_chunks(chunks, processor, true)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[1].is_error());
        assert!(results[1].error().unwrap().contains("rule crashed"));

        let merged = BatchProcessor::merge_results(&results);
        assert_eq!(merged.iter().map(|i| i.line).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(BatchProcessor::collect_errors(&results).len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_processor_is_recorded() {
        let processor: ChunkProcessor = Arc::new(|content: &str, _file: &str, _offset: usize| -> anyhow::Result<Vec<Issue>> {
            if content.contains("panic") {
                panic!("detector bug");
            }
            Ok(Vec::new())
        });
        let chunks = vec![chunk(0, 1, 1, 2, "panic\n"), chunk(1, 2, 2, 2, "fine\n")];

        for parallel in [false, true] {
            let results = BatchProcessor::default()
                .process_chunks(chunks.clone(), Arc::clone(&processor), parallel)
                .await
                .unwrap();
            assert!(results[0].error().unwrap().contains("detector bug"));
            assert!(!results[1].is_error());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_results_are_in_chunk_order() {
        // Earlier chunks sleep longer, so they finish last.
        let processor: ChunkProcessor = Arc::new(|content: &str, file: &str, offset: usize| -> anyhow::Result<Vec<Issue>> {
            let delay: u64 = content.trim().parse().unwrap_or(0);
            std::thread::sleep(Duration::from_millis(delay));
            Ok(vec![Issue::new("r", file, offset + 1, content.trim(), Severity::Info)])
        });
        let total = 6;
        let chunks: Vec<Chunk> = (0..total)
            .map(|i| chunk(i, i + 1, i + 1, total, &format!("{}\n", (total - i) * 15)))
            .collect();

        let results = BatchProcessor::new(4)
            .process_chunks(chunks, processor, true)
            .await
            .unwrap();

        let order: Vec<usize> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, (0..total).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_invalid_chunk_list_fails_fast() {
        let processor = bad_line_processor();

        let zero_start = vec![chunk(0, 0, 3, 1, "")];
        assert!(matches!(
            BatchProcessor::default()
                .process_chunks(zero_start, Arc::clone(&processor), true)
                .await,
            Err(DomainError::InvalidChunk(_))
        ));

        let inverted = vec![chunk(0, 5, 3, 1, "")];
        assert!(BatchProcessor::default()
            .process_chunks(inverted, Arc::clone(&processor), true)
            .await
            .is_err());

        let duplicate = vec![chunk(0, 1, 3, 2, ""), chunk(0, 1, 3, 2, "")];
        assert!(BatchProcessor::default()
            .process_chunks(duplicate, Arc::clone(&processor), true)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_empty_chunk_list() {
        let results = BatchProcessor::default()
            .process_chunks(Vec::new(), bad_line_processor(), true)
            .await
            .unwrap();
        assert!(results.is_empty());
        assert!(BatchProcessor::merge_results(&results).is_empty());
    }

    #[test]
    fn test_merge_sorts_by_file_then_line() {
        let c = chunk(0, 1, 10, 1, "");
        let results = vec![ChunkResult::success(
            c,
            vec![
                Issue::new("r", "b.tex", 1, "x", Severity::Info),
                Issue::new("r", "a.tex", 9, "x", Severity::Info),
                Issue::new("r", "a.tex", 2, "x", Severity::Info),
            ],
        )];

        let merged = BatchProcessor::merge_results(&results);
        let keys: Vec<(&str, usize)> = merged.iter().map(|i| (i.file.as_str(), i.line)).collect();
        assert_eq!(keys, vec![("a.tex", 2), ("a.tex", 9), ("b.tex", 1)]);
    }

    #[test]
    fn test_zero_workers_clamped() {
        assert_eq!(BatchProcessor::new(0).max_workers(), 1);
    }
}
