//! Property tests for chunking, merging and chunked detection.

mod common;

use proptest::prelude::*;
use std::sync::Arc;
use texguard::adapters::rules::bidi::BiDiDetector;
use texguard::services::{dedup_issues, BatchProcessor, ChunkProcessor, Chunker};
use texguard::{ChunkResult, ChunkingConfig, Detector, Issue, Severity};

fn numbered_lines(n: usize) -> String {
    (1..=n).map(|i| format!("line {i}\n")).collect()
}

fn issue_strategy() -> impl Strategy<Value = Issue> {
    (
        prop::sample::select(vec!["a.tex", "b.tex", "c.bib"]),
        1usize..50,
        prop::sample::select(vec!["rule-x", "rule-y"]),
        "[a-z]{1,3}",
    )
        .prop_map(|(file, line, rule, content)| {
            Issue::new(rule, file, line, content, Severity::Warning)
        })
}

proptest! {
    /// Property: every line of the document lies in at least one chunk,
    /// chunk starts advance by exactly `chunk_size`, and neighbouring
    /// chunks share `overlap` lines unless the file ends first.
    #[test]
    fn prop_chunks_cover_every_line(
        lines in 1usize..400,
        chunk_size in 1usize..60,
        overlap_seed in 0usize..60,
    ) {
        let overlap = overlap_seed % chunk_size;
        let chunker = Chunker::with_config(ChunkingConfig::new(chunk_size, overlap)).unwrap();
        let chunks = chunker.create_chunks("doc.tex", &numbered_lines(lines));

        prop_assert_eq!(chunks.len(), lines.div_ceil(chunk_size).max(1));
        prop_assert_eq!(chunks[0].start_line, 1);
        prop_assert_eq!(chunks.last().unwrap().end_line, lines);

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.chunk_index, i);
            prop_assert!(chunk.start_line <= chunk.end_line);
            if chunks.len() > 1 {
                prop_assert_eq!(chunk.start_line, i * chunk_size + 1);
            }
        }
        for pair in chunks.windows(2) {
            prop_assert!(pair[1].start_line <= pair[0].end_line + 1);
            let shared = pair[0].end_line + 1 - pair[1].start_line;
            let remaining = lines + 1 - pair[1].start_line;
            prop_assert!(
                shared >= overlap.min(remaining),
                "chunks {} and {} share {} lines, expected at least {}",
                pair[0].chunk_index, pair[1].chunk_index, shared, overlap.min(remaining)
            );
        }
    }

    /// Property: merging is idempotent under duplication.
    #[test]
    fn prop_dedup_of_doubled_list_is_dedup(issues in prop::collection::vec(issue_strategy(), 0..40)) {
        let once = dedup_issues(issues.clone());
        let doubled = dedup_issues(issues.iter().cloned().chain(issues.iter().cloned()));
        prop_assert_eq!(&once, &doubled);
        prop_assert_eq!(dedup_issues(once.clone()), once);
    }

    /// Property: merged issues are sorted by (file, line).
    #[test]
    fn prop_merge_is_sorted(
        groups in prop::collection::vec(prop::collection::vec(issue_strategy(), 0..10), 1..6)
    ) {
        let chunker = Chunker::new();
        let results: Vec<ChunkResult> = groups
            .into_iter()
            .enumerate()
            .map(|(i, issues)| {
                let mut chunk = chunker.create_chunks("a.tex", "x\n").remove(0);
                chunk.chunk_index = i;
                ChunkResult::success(chunk, issues)
            })
            .collect();

        let merged = BatchProcessor::merge_results(&results);
        for pair in merged.windows(2) {
            prop_assert!((&pair[0].file, pair[0].line) <= (&pair[1].file, pair[1].line));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: chunked detection finds exactly what whole-document
    /// detection finds, for any chunk size and overlap.
    #[test]
    fn prop_chunked_detection_matches_whole_document(
        lines in 1usize..200,
        every in 1usize..9,
        chunk_size in 1usize..40,
        overlap_seed in 0usize..40,
        parallel in any::<bool>(),
    ) {
        let overlap = overlap_seed % chunk_size;
        let content = common::long_document(lines, every);
        let detector = Arc::new(BiDiDetector::new().unwrap());

        let whole = dedup_issues(detector.detect(&content, "doc.tex", 0).unwrap());

        let chunker = Chunker::with_config(ChunkingConfig::new(chunk_size, overlap)).unwrap();
        let chunks = chunker.create_chunks("doc.tex", &content);
        let worker = Arc::clone(&detector);
        let processor: ChunkProcessor = Arc::new(move |text: &str, path: &str, offset: usize| {
            worker.detect(text, path, offset)
        });

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let results = runtime
            .block_on(BatchProcessor::new(4).process_chunks(chunks, processor, parallel))
            .unwrap();
        let chunked = BatchProcessor::merge_results(&results);

        prop_assert_eq!(chunked, whole);
    }
}
