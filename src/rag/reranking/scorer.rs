//! Embedding re-ranker
//!
//! Pulls `k × candidate_multiplier` neighbours, rescores each with the exact
//! cosine between query and candidate embeddings plus a small boost for
//! query words found in the chunk text, then keeps the best `k`.

use async_trait::async_trait;

use crate::errors::Result;
use crate::rag::retrieval::{Query, RetrievalStrategy};
use crate::store::{cosine_similarity, sort_by_score, ScoredChunk, VectorStore};

/// Upper bound of the lexical boost
pub const DEFAULT_KEYWORD_BOOST: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct EmbeddingRerankStrategy {
    candidate_multiplier: usize,
    keyword_boost: f32,
}

impl EmbeddingRerankStrategy {
    pub fn new(candidate_multiplier: usize) -> Self {
        Self {
            candidate_multiplier: candidate_multiplier.max(1),
            keyword_boost: DEFAULT_KEYWORD_BOOST,
        }
    }

    pub fn with_keyword_boost(mut self, boost: f32) -> Self {
        self.keyword_boost = boost.max(0.0);
        self
    }

    /// Rescore and order candidates, best first
    pub fn rerank(&self, query: &Query, candidates: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        let mut ranked: Vec<ScoredChunk> = candidates
            .into_iter()
            .map(|mut candidate| {
                let similarity = if candidate.chunk.embedding.is_empty() {
                    candidate.score
                } else {
                    cosine_similarity(&query.embedding, &candidate.chunk.embedding)
                };
                candidate.score = similarity
                    + keyword_boost(&query.text, &candidate.chunk.text, self.keyword_boost);
                candidate
            })
            .collect();

        sort_by_score(&mut ranked);
        ranked
    }
}

#[async_trait]
impl RetrievalStrategy for EmbeddingRerankStrategy {
    fn name(&self) -> &'static str {
        "embedding-rerank"
    }

    async fn retrieve(
        &self,
        store: &dyn VectorStore,
        query: &Query,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let candidates = store
            .search(&query.embedding, k.saturating_mul(self.candidate_multiplier))
            .await?;

        let mut ranked = self.rerank(query, candidates);
        ranked.truncate(k);
        Ok(ranked)
    }
}

/// Share of longer query words present in `content`, scaled to `max_boost`
pub fn keyword_boost(query: &str, content: &str, max_boost: f32) -> f32 {
    let query_lower = query.to_lowercase();
    let content_lower = content.to_lowercase();

    let query_words: Vec<&str> = query_lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 3)
        .collect();
    if query_words.is_empty() {
        return 0.0;
    }

    let matches = query_words
        .iter()
        .filter(|word| content_lower.contains(*word))
        .count();

    max_boost * matches as f32 / query_words.len() as f32
}
