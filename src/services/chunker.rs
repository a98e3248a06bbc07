//! Document-type-aware recursive text chunking.

use std::sync::Arc;

use crate::error::SplitError;
use crate::models::{Chunk, ChunkPosition, DocumentType};
use crate::services::detector::TypeDetector;
use crate::services::monitor::PerformanceMonitor;
use crate::utils::text::{clean_chunk, extract_keywords, has_structure_markers, preprocess};
use crate::utils::validate_chunk_params;

const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " ", ""];
const ACADEMIC_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "; ", ", ", " ", ""];
const TECHNICAL_SEPARATORS: &[&str] = &["\n\n", "\n", ".\n", ". ", ":\n", ": ", " ", ""];
const LEGAL_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "; ", " - ", " ", ""];

/// Separator priority used when splitting a document of the given type.
pub fn separators_for(document_type: DocumentType) -> &'static [&'static str] {
    match document_type {
        DocumentType::Default => DEFAULT_SEPARATORS,
        DocumentType::Academic => ACADEMIC_SEPARATORS,
        DocumentType::Technical => TECHNICAL_SEPARATORS,
        DocumentType::Legal => LEGAL_SEPARATORS,
    }
}

/// Splits documents into enriched, overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextChunker {
    detector: TypeDetector,
    monitor: Arc<PerformanceMonitor>,
}

impl TextChunker {
    pub fn new(monitor: Arc<PerformanceMonitor>) -> Self {
        Self {
            detector: TypeDetector::new(),
            monitor,
        }
    }

    /// Split `text` into chunks of at most `chunk_size` characters, carrying
    /// up to `chunk_overlap` characters of context between neighbours.
    ///
    /// Parameters are validated before any processing. Fails with
    /// [`SplitError::EmptyResult`] when nothing survives cleaning.
    pub fn split(
        &self,
        text: &str,
        filename: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Vec<Chunk>, SplitError> {
        validate_chunk_params(chunk_size, chunk_overlap)?;

        self.monitor.measure_sync("split_document", || {
            let document_type = self.detector.detect(text);
            let splitter = RecursiveSplitter {
                chunk_size,
                chunk_overlap,
            };

            let contents: Vec<String> = splitter
                .split(&preprocess(text), separators_for(document_type))
                .iter()
                .map(|piece| clean_chunk(piece))
                .filter(|piece| !piece.is_empty())
                .collect();

            if contents.is_empty() {
                return Err(SplitError::EmptyResult {
                    filename: filename.to_string(),
                });
            }

            let total_chunks = contents.len();
            let chunks: Vec<Chunk> = contents
                .into_iter()
                .enumerate()
                .map(|(chunk_id, content)| Chunk {
                    filename: filename.to_string(),
                    chunk_id,
                    total_chunks,
                    document_type,
                    chunk_size: content.chars().count(),
                    chunk_position: ChunkPosition::of(chunk_id, total_chunks),
                    contains_structure: has_structure_markers(&content),
                    keywords: extract_keywords(&content),
                    content,
                })
                .collect();

            tracing::debug!(
                filename,
                document_type = %document_type,
                chunks = total_chunks,
                "document split"
            );
            Ok(chunks)
        })
    }
}

/// Recursive character splitter.
///
/// The first separator found in the text splits it; pieces shorter than
/// `chunk_size` are merged back together, longer ones recurse with the
/// remaining separators. The empty separator splits into characters.
struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();

        let (separator, remaining) = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .map(|i| (separators[i], &separators[i + 1..]))
            .unwrap_or(("", &[]));

        let mut good: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() || separator.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split(&piece, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }
        chunks
    }

    /// Greedily join pieces up to `chunk_size`, starting each new chunk with
    /// the trailing pieces of the previous one that fit in `chunk_overlap`.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<(&str, usize)> = Default::default();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                push_joined(&mut docs, current.iter().map(|(s, _)| *s));

                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match current.pop_front() {
                        Some((_, popped)) => total -= popped,
                        None => break,
                    }
                }
            }
            current.push_back((piece, len));
            total += len;
        }

        push_joined(&mut docs, current.iter().map(|(s, _)| *s));
        docs
    }
}

fn push_joined<'a>(docs: &mut Vec<String>, pieces: impl Iterator<Item = &'a str>) {
    let joined: String = pieces.collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching each separator to the piece after it.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn chunker() -> TextChunker {
        TextChunker::new(Arc::new(PerformanceMonitor::default()))
    }

    fn plain_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {} is here.", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_split_keeping_separator() {
        assert_eq!(
            split_keeping_separator("a. b. c", ". "),
            vec!["a", ". b", ". c"]
        );
        assert_eq!(split_keeping_separator("\nabc", "\n"), vec!["\nabc"]);
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
    }

    #[test]
    fn test_separator_tables() {
        assert_eq!(separators_for(DocumentType::Legal)[4], " - ");
        assert_eq!(separators_for(DocumentType::Technical)[2], ".\n");
        assert!(separators_for(DocumentType::Academic).ends_with(&[" ", ""]));
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let chunker = chunker();
        assert!(matches!(
            chunker.split("text", "a.txt", 99, 50),
            Err(SplitError::Validation(ValidationError::ChunkSize { .. }))
        ));
        assert!(matches!(
            chunker.split("text", "a.txt", 200, 10),
            Err(SplitError::Validation(ValidationError::ChunkOverlapTooSmall { .. }))
        ));
        assert!(matches!(
            chunker.split("text", "a.txt", 200, 200),
            Err(SplitError::Validation(ValidationError::ChunkOverlapTooLarge { .. }))
        ));
    }

    #[test]
    fn test_empty_document_fails() {
        let result = chunker().split("  \n\t ... ", "empty.txt", 200, 50);
        assert!(matches!(result, Err(SplitError::EmptyResult { filename }) if filename == "empty.txt"));
    }

    #[test]
    fn test_short_document_is_single_start_chunk() {
        let chunks = chunker().split("Just one line of text.", "one.txt", 200, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_position, ChunkPosition::Start);
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].content, "Just one line of text.");
    }

    #[test]
    fn test_plain_text_positions_and_ids() {
        let chunks = chunker().split(&plain_text(40), "plain.txt", 200, 50).unwrap();
        let total = chunks.len();
        assert!(total >= 3);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, i);
            assert_eq!(chunk.total_chunks, total);
            assert_eq!(chunk.document_type, DocumentType::Default);
            assert!(!chunk.contains_structure);
            assert!(chunk.chunk_size <= 200);
            assert_eq!(chunk.chunk_size, chunk.content.chars().count());
            assert!(chunk.keywords.len() <= 5);
        }
        assert_eq!(chunks[0].chunk_position, ChunkPosition::Start);
        assert_eq!(chunks[total - 1].chunk_position, ChunkPosition::End);
        assert!(
            chunks[1..total - 1]
                .iter()
                .all(|c| c.chunk_position == ChunkPosition::Middle)
        );
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let chunks = chunker().split(&plain_text(40), "plain.txt", 200, 50).unwrap();
        for pair in chunks.windows(2) {
            let first_line = pair[1].content.lines().next().unwrap();
            assert!(pair[0].content.contains(first_line));
        }
    }

    #[test]
    fn test_every_word_is_preserved() {
        let text = plain_text(30);
        let chunks = chunker().split(&text, "plain.txt", 150, 50).unwrap();
        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join(" ");
        for word in text.split_whitespace() {
            assert!(joined.contains(word), "missing {word}");
        }
    }

    #[test]
    fn test_long_token_falls_back_to_characters() {
        let text = "x".repeat(450);
        let chunks = chunker().split(&text, "blob.txt", 100, 50).unwrap();
        assert!(chunks.len() >= 5);
        assert!(chunks.iter().all(|c| c.chunk_size <= 100));
        assert!(chunks.iter().all(|c| c.content.chars().all(|ch| ch == 'x')));
    }

    #[test]
    fn test_legal_document_enrichment() {
        let text = "Article 1. Le contrat est conclu pour une durée déterminée. \
                    Article 2. La clause de résiliation s'applique selon l'alinéa 4.";
        let chunks = chunker().split(text, "contrat.txt", 500, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].document_type, DocumentType::Legal);
        assert!(chunks[0].keywords.contains(&"article".to_string()));
    }

    #[test]
    fn test_structure_markers_detected() {
        let text = "Overview of the setup. Note: run the installer first. Then restart.";
        let chunks = chunker().split(text, "steps.txt", 500, 50).unwrap();
        assert!(chunks.iter().any(|c| c.contains_structure));
    }

    #[test]
    fn test_split_is_measured() {
        let monitor = Arc::new(PerformanceMonitor::default());
        let chunker = TextChunker::new(monitor.clone());
        chunker.split(&plain_text(5), "a.txt", 200, 50).unwrap();
        let _ = chunker.split("", "b.txt", 200, 50);

        let summary = monitor.summary(Some("split_document"), None).unwrap();
        assert_eq!(summary.total_operations, 2);
        assert!((summary.success_rate - 50.0).abs() < 1e-9);
    }
}
