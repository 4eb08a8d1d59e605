//! Boundary-aware text chunking with token budgets and sentence overlap

use regex::Regex;
use serde_json::json;

use crate::config::ChunkingConfig;
use crate::types::TextChunk;

/// Byte range of one sentence in the normalized source text
#[derive(Debug, Clone, Copy)]
struct SentenceSpan {
    start: usize,
    end: usize,
}

/// Splits raw document text into semantically coherent, token-bounded chunks
/// with controlled sentence overlap.
///
/// Offsets on the produced chunks refer to the normalized text (CRLF folded
/// to LF), not the raw input. Every chunk is a contiguous slice of that text,
/// so consecutive chunks share their overlap region verbatim.
pub struct SemanticChunker {
    chunk_size: usize,
    overlap: usize,
    min_chunk_size: usize,
    chars_per_token: usize,
    boundary: Regex,
    paragraph: Regex,
}

impl SemanticChunker {
    /// Create a chunker from configuration
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            // overlap can never consume a whole chunk
            overlap: config.chunk_overlap.min(config.chunk_size.saturating_sub(1)),
            min_chunk_size: config.min_chunk_size,
            chars_per_token: config.chars_per_token.max(1),
            // A sentence ends at `.`, `!` or `?` followed by whitespace and a
            // capital letter. Known to mis-split abbreviations and decimals.
            boundary: Regex::new(r"[.!?]\s+[A-Z]").expect("invalid sentence boundary regex"),
            paragraph: Regex::new(r"\n\s*\n").expect("invalid paragraph regex"),
        }
    }

    /// Split `text` into ordered chunks
    ///
    /// Empty or whitespace-only input yields an empty list. Chunk indices are
    /// contiguous from 0.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let normalized = text.replace("\r\n", "\n");
        if normalized.trim().is_empty() {
            return Vec::new();
        }

        let sentences = self.sentence_spans(&normalized);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks: Vec<TextChunk> = Vec::new();
        // first sentence of the open chunk
        let mut first = 0usize;
        // first sentence of the open chunk that is not overlap carried forward
        let mut content_start = 0usize;
        let mut cur = 0usize;

        while cur < sentences.len() {
            let est = self.estimate_span(&normalized, sentences[first].start, sentences[cur].end);
            if est > self.chunk_size && cur > content_start {
                self.push_chunk(
                    &mut chunks,
                    &normalized,
                    sentences[first].start,
                    sentences[cur - 1].end,
                );

                // Seed the next chunk with whole trailing sentences that fit
                // the overlap budget; partial sentences are discarded.
                let mut seed = cur;
                let mut k = cur;
                while k > first + 1 {
                    let cand = k - 1;
                    let overlap_est = self.estimate_span(
                        &normalized,
                        sentences[cand].start,
                        sentences[cur - 1].end,
                    );
                    if overlap_est <= self.overlap {
                        seed = cand;
                        k -= 1;
                    } else {
                        break;
                    }
                }

                first = seed;
                content_start = cur;
                continue;
            }
            cur += 1;
        }

        // Trailing chunk: merge into the predecessor when undersized, but a
        // one-chunk document is kept no matter how small.
        let last = sentences.len() - 1;
        let tail_start = sentences[first].start;
        let tail_end = sentences[last].end;
        let tail_est = self.estimate_span(&normalized, tail_start, tail_end);

        if tail_est < self.min_chunk_size && !chunks.is_empty() {
            if let Some(prev) = chunks.last_mut() {
                let prev_est = prev.estimated_tokens().unwrap_or(0);
                prev.end_char = tail_end;
                prev.content = normalized[prev.start_char..tail_end].to_string();
                prev.metadata
                    .insert("estimated_tokens".to_string(), json!(prev_est + tail_est as u64));
            }
        } else {
            self.push_chunk(&mut chunks, &normalized, tail_start, tail_end);
        }

        chunks
    }

    /// Estimated tokens: `ceil(chars / chars_per_token)`
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn estimate_span(&self, text: &str, start: usize, end: usize) -> usize {
        self.estimate(&text[start..end])
    }

    fn push_chunk(&self, chunks: &mut Vec<TextChunk>, text: &str, start: usize, end: usize) {
        let content = text[start..end].to_string();
        let est = self.estimate(&content);
        let index = chunks.len() as u32;
        let mut chunk = TextChunk::new(content, index, start, end);
        chunk
            .metadata
            .insert("estimated_tokens".to_string(), json!(est as u64));
        chunks.push(chunk);
    }

    /// Collect sentence spans, paragraph by paragraph
    fn sentence_spans(&self, text: &str) -> Vec<SentenceSpan> {
        let mut spans = Vec::new();
        let mut start = 0usize;
        for m in self.paragraph.find_iter(text) {
            self.split_paragraph(text, start, m.start(), &mut spans);
            start = m.end();
        }
        self.split_paragraph(text, start, text.len(), &mut spans);
        spans
    }

    /// Split one paragraph into sentence spans
    ///
    /// A paragraph with no sentence-ending punctuation is one sentence.
    fn split_paragraph(
        &self,
        text: &str,
        start: usize,
        end: usize,
        spans: &mut Vec<SentenceSpan>,
    ) {
        let para = &text[start..end];
        if para.trim().is_empty() {
            return;
        }

        let mut cursor = 0usize;
        for m in self.boundary.find_iter(para) {
            // keep the terminator with the sentence; the match ends on the
            // capital letter that opens the next one
            let sentence_end = m.start() + 1;
            let next_start = m.end() - 1;
            if let Some(span) = trimmed_span(para, cursor, sentence_end) {
                spans.push(SentenceSpan {
                    start: start + span.0,
                    end: start + span.1,
                });
            }
            cursor = next_start;
        }

        if let Some(span) = trimmed_span(para, cursor, para.len()) {
            spans.push(SentenceSpan {
                start: start + span.0,
                end: start + span.1,
            });
        }
    }
}

/// Trim whitespace off both ends of `para[start..end]`, returning the
/// narrowed range or `None` if nothing remains
fn trimmed_span(para: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &para[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some((start + lead, start + lead + trimmed.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, overlap: usize, min_size: usize) -> SemanticChunker {
        SemanticChunker::new(&ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
            min_chunk_size: min_size,
            chars_per_token: 4,
        })
    }

    /// 30 sentences of 33 chars each, two paragraphs
    fn sample_document() -> String {
        let sentence = "Chunk packing keeps going nicely.";
        let para: Vec<&str> = std::iter::repeat(sentence).take(15).collect();
        format!("{}\n\n{}", para.join(" "), para.join(" "))
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = chunker(400, 50, 50);
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n \t ").is_empty());
    }

    #[test]
    fn test_no_punctuation_is_one_sentence() {
        let chunker = chunker(400, 50, 50);
        let chunks = chunker.chunk("a stream of words with no terminator at all");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].content, "a stream of words with no terminator at all");
    }

    #[test]
    fn test_single_undersized_chunk_is_kept() {
        let chunker = chunker(400, 50, 50);
        let chunks = chunker.chunk("Tiny.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Tiny.");
    }

    #[test]
    fn test_indices_are_contiguous() {
        let chunker = chunker(50, 10, 5);
        let chunks = chunker.chunk(&sample_document());
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index as usize, i);
        }
    }

    #[test]
    fn test_chunks_cover_the_source() {
        let chunker = chunker(50, 10, 5);
        let text = sample_document();
        let chunks = chunker.chunk(&text);

        // Contiguous slices: each chunk starts at or before the previous end
        let first = chunks.first().unwrap();
        let last = chunks.last().unwrap();
        assert_eq!(first.start_char, 0);
        assert_eq!(last.end_char, text.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].start_char <= pair[0].end_char);
        }
        for chunk in &chunks {
            assert_eq!(chunk.content, &text[chunk.start_char..chunk.end_char]);
        }
    }

    #[test]
    fn test_example_scenario_overlap_and_bounds() {
        // ~1000-char two-paragraph document, 50-token chunks, 10-token overlap
        let chunker = chunker(50, 10, 5);
        let text = sample_document();
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() >= 4, "expected at least 4 chunks, got {}", chunks.len());
        for chunk in &chunks {
            assert!(chunk.end_char <= text.len());
        }

        // The second chunk leads with the overlap tail of the first
        let (c0, c1) = (&chunks[0], &chunks[1]);
        assert!(c1.start_char < c0.end_char, "chunks should overlap");
        let overlap = &text[c1.start_char..c0.end_char];
        assert!(c0.content.ends_with(overlap));
        assert!(c1.content.starts_with(overlap));
    }

    #[test]
    fn test_overlap_bound_respected() {
        let chunker = chunker(50, 10, 5);
        let text = sample_document();
        let chunks = chunker.chunk(&text);

        for pair in chunks.windows(2) {
            if pair[1].start_char < pair[0].end_char {
                let shared = &text[pair[1].start_char..pair[0].end_char];
                let est = shared.chars().count().div_ceil(4);
                assert!(est <= 10, "overlap estimate {} exceeds budget", est);
            }
        }
    }

    #[test]
    fn test_undersized_trailing_chunk_merges() {
        // Two sentences per 17-token chunk; the final window ends up under
        // the 12-token minimum and folds into its predecessor.
        let sentence = "Chunk packing keeps going nicely.";
        let text = format!("{} The end.", vec![sentence; 5].join(" "));
        let chunker = chunker(17, 0, 12);
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 2);
        let last = chunks.last().unwrap();
        assert!(last.content.ends_with("The end."));
        assert_eq!(last.end_char, text.len());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index as usize, i);
        }
    }

    #[test]
    fn test_oversized_sentence_becomes_own_chunk() {
        let long = "Wordy ".repeat(80).trim_end().to_string() + ".";
        let text = format!("Short one. {} Short two.", long);
        let chunker = chunker(50, 10, 5);
        let chunks = chunker.chunk(&text);

        assert!(chunks.iter().any(|c| c.content.contains("Wordy Wordy")));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index as usize, i);
        }
    }

    #[test]
    fn test_token_estimate_metadata() {
        let chunker = chunker(400, 50, 5);
        let chunks = chunker.chunk("Some words here. More words there.");
        assert_eq!(chunks.len(), 1);
        let est = chunks[0].estimated_tokens().unwrap();
        assert_eq!(est, (chunks[0].content.chars().count() as u64).div_ceil(4));
    }
}
