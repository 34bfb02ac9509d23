//! Context assembly for augmented prompts
//!
//! Retrieved chunks are rendered as labelled passages and packed into batches
//! that fit a token budget. Order is preserved; a passage larger than the
//! whole budget is cut to fit rather than dropped.

use serde::{Deserialize, Serialize};

use crate::context::TokenCounter;
use crate::store::ScoredChunk;

/// Separator between passages in a batch
const PASSAGE_SEPARATOR: &str = "\n\n";

/// How passages are labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextFormat {
    /// `[Document n] (source: …, score: …)` header above each passage
    #[default]
    Structured,
    /// Passage text only
    Plain,
}

/// Renders and packs retrieved chunks
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    format: ContextFormat,
    counter: TokenCounter,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(format: ContextFormat) -> Self {
        Self {
            format,
            counter: TokenCounter::new(),
        }
    }

    /// Render every chunk as a passage, numbered from 1
    pub fn passages(&self, chunks: &[ScoredChunk]) -> Vec<String> {
        chunks
            .iter()
            .enumerate()
            .map(|(i, c)| self.format_passage(i + 1, c))
            .collect()
    }

    fn format_passage(&self, index: usize, chunk: &ScoredChunk) -> String {
        match self.format {
            ContextFormat::Structured => format!(
                "[Document {}] (source: {}, score: {:.2})\n{}",
                index, chunk.chunk.source, chunk.score, chunk.chunk.text
            ),
            ContextFormat::Plain => chunk.chunk.text.clone(),
        }
    }

    /// Join passages into one context block
    pub fn join(&self, passages: &[String]) -> String {
        passages.join(PASSAGE_SEPARATOR)
    }

    /// Take passages from the front of `queue` while they fit `budget` tokens
    ///
    /// At least one passage is always taken, truncated when it alone exceeds
    /// the budget.
    pub fn take_batch(&self, queue: &mut Vec<String>, budget: usize) -> String {
        let mut batch = String::new();

        while let Some(next) = queue.first() {
            let candidate = if batch.is_empty() {
                next.clone()
            } else {
                format!("{}{}{}", batch, PASSAGE_SEPARATOR, next)
            };

            if self.counter.fits(&candidate, budget) {
                batch = candidate;
                queue.remove(0);
            } else if batch.is_empty() {
                let passage = queue.remove(0);
                batch = self.truncate(&passage, budget);
                break;
            } else {
                break;
            }
        }

        batch
    }

    /// Cut `text` so its conservative estimate fits `budget`
    pub fn truncate(&self, text: &str, budget: usize) -> String {
        if self.counter.fits(text, budget) {
            return text.to_string();
        }
        // Leave room for the 10% margin in `fits`
        let max_chars = self.counter.chars_for(budget * 10 / 11);
        text.chars().take(max_chars).collect()
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }
}
