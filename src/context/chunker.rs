//! Document chunker
//!
//! Wraps `text_splitter::TextSplitter` with a sizer that counts estimated
//! tokens, so `chunk_size` and `overlap` are both in tokens. The splitter
//! prefers the highest semantic boundary that fits (paragraph, sentence,
//! word, grapheme).

use text_splitter::{ChunkConfig, ChunkSizer, TextSplitter};

use crate::context::counter::TokenCounter;

/// A chunk of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// Position within the document
    pub index: usize,
}

/// Sizes chunks by the character heuristic in `TokenCounter`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSizer {
    counter: TokenCounter,
}

impl ChunkSizer for TokenSizer {
    fn size(&self, chunk: &str) -> usize {
        self.counter.estimate(chunk)
    }
}

/// Chunker configuration
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(512, 50)
    }
}

impl TextChunker {
    /// Chunker with sizes in tokens; overlap is capped at half a chunk
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size / 2),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn splitter(&self) -> TextSplitter<TokenSizer> {
        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.overlap)
            .unwrap_or_else(|_| ChunkConfig::new(self.chunk_size))
            .with_sizer(TokenSizer::default());
        TextSplitter::new(config)
    }

    /// Split `text` into ordered chunks; whitespace-only input yields none
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        self.splitter()
            .chunks(text)
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .enumerate()
            .map(|(index, piece)| TextChunk {
                text: piece.to_string(),
                index,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_is_single_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk("Short text.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text.");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        let chunker = TextChunker::default();
        assert!(chunker.chunk("  \n\t ").is_empty());
    }

    #[test]
    fn test_splits_at_sentence_boundaries() {
        // 10 tokens => 40 chars per chunk
        let chunker = TextChunker::new(10, 0);
        let text = "This is sentence one. This is sentence two. This is sentence three.";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "This is sentence one.");
        assert_eq!(chunks[1].text, "This is sentence two.");
        assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn test_chunks_stay_within_token_budget() {
        let chunker = TextChunker::new(8, 2);
        let sizer = TokenSizer::default();
        let text = "Retrieval augmented generation pairs a vector store with a language model. \
                    Passages are embedded once and searched per question.\n\n\
                    The answer is grounded in the passages that were found.";

        let chunks = chunker.chunk(text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| sizer.size(&c.text) <= 8));
    }

    #[test]
    fn test_overlap_repeats_words_across_chunks() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi";
        let words_in_text = text.split_whitespace().count();

        let plain: usize = TextChunker::new(6, 0)
            .chunk(text)
            .iter()
            .map(|c| c.text.split_whitespace().count())
            .sum();
        let overlapping: usize = TextChunker::new(6, 3)
            .chunk(text)
            .iter()
            .map(|c| c.text.split_whitespace().count())
            .sum();

        assert_eq!(plain, words_in_text);
        assert!(overlapping > words_in_text);
    }

    #[test]
    fn test_overlap_is_capped_at_half_a_chunk() {
        let chunker = TextChunker::new(10, 50);
        assert_eq!(chunker.overlap(), 5);
        assert_eq!(TextChunker::new(0, 3).chunk_size(), 1);
    }

    #[test]
    fn test_text_without_breaks_is_split_on_graphemes() {
        let chunker = TextChunker::new(2, 0);
        let text = "日本語のテキストには句読点がない";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() > 1);
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, text);
    }
}
