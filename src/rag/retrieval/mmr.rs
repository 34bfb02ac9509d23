//! Maximal Marginal Relevance
//!
//! MMR = λ × sim(query, doc) − (1 − λ) × max(sim(doc, selected))
//!
//! λ = 1.0 is plain relevance ranking, λ = 0.0 pure diversity.

use async_trait::async_trait;

use crate::errors::Result;
use crate::rag::retrieval::{Query, RetrievalStrategy};
use crate::store::{cosine_similarity, ScoredChunk, VectorStore};

/// Diversity-aware selection over an enlarged candidate pool
#[derive(Debug, Clone, Copy)]
pub struct MmrStrategy {
    lambda: f32,
    candidate_multiplier: usize,
}

impl MmrStrategy {
    pub fn new(lambda: f32, candidate_multiplier: usize) -> Self {
        Self {
            lambda: lambda.clamp(0.0, 1.0),
            candidate_multiplier: candidate_multiplier.max(1),
        }
    }
}

#[async_trait]
impl RetrievalStrategy for MmrStrategy {
    fn name(&self) -> &'static str {
        "mmr"
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
        Ok(mmr_select(&query.embedding, candidates, k, self.lambda))
    }
}

/// Pick `k` candidates greedily by MMR score
///
/// Returned chunks carry their MMR score at selection time.
pub fn mmr_select(
    query: &[f32],
    candidates: Vec<ScoredChunk>,
    k: usize,
    lambda: f32,
) -> Vec<ScoredChunk> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let k = k.min(candidates.len());
    let mut remaining: Vec<(ScoredChunk, f32)> = candidates
        .into_iter()
        .map(|c| {
            let relevance = cosine_similarity(query, &c.chunk.embedding);
            (c, relevance)
        })
        .collect();
    let mut selected: Vec<ScoredChunk> = Vec::with_capacity(k);

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, (candidate, relevance)) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.chunk.embedding, &s.chunk.embedding))
                .fold(0.0f32, f32::max);

            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        let (mut best, _) = remaining.remove(best_idx);
        best.score = best_score;
        selected.push(best);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoredChunk;
    use std::collections::HashMap;

    fn candidate(id: &str, embedding: Vec<f32>) -> ScoredChunk {
        ScoredChunk {
            score: 0.0,
            chunk: StoredChunk {
                id: id.to_string(),
                document_id: id.to_string(),
                source: format!("{}.txt", id),
                chunk_index: 0,
                text: id.to_string(),
                embedding,
                metadata: HashMap::new(),
            },
        }
    }

    fn ids(chunks: &[ScoredChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.chunk.id.as_str()).collect()
    }

    #[test]
    fn test_prefers_distinct_over_near_duplicate() {
        let query = [1.0, 0.5, 0.0];
        let candidates = vec![
            candidate("dup_a", vec![1.0, 0.06, 0.0]),
            candidate("dup_b", vec![1.0, 0.05, 0.0]),
            candidate("distinct", vec![0.0, 1.0, 0.0]),
        ];

        let picked = mmr_select(&query, candidates, 2, 0.5);
        assert_eq!(ids(&picked), vec!["dup_a", "distinct"]);
    }

    #[test]
    fn test_lambda_one_is_relevance_order() {
        let query = [1.0, 0.0];
        let candidates = vec![
            candidate("low", vec![0.2, 1.0]),
            candidate("high", vec![1.0, 0.0]),
            candidate("mid", vec![1.0, 1.0]),
        ];

        let picked = mmr_select(&query, candidates, 3, 1.0);
        assert_eq!(ids(&picked), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_k_larger_than_pool() {
        let picked = mmr_select(&[1.0], vec![candidate("only", vec![1.0])], 5, 0.5);
        assert_eq!(picked.len(), 1);
        assert!(mmr_select(&[1.0], Vec::new(), 3, 0.5).is_empty());
    }

    #[tokio::test]
    async fn test_huge_k_does_not_overflow_pool_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = crate::store::LocalStore::open(dir.path(), "mmr").await.unwrap();
        store
            .upsert(vec![
                candidate("a", vec![1.0, 0.0]).chunk,
                candidate("b", vec![0.0, 1.0]).chunk,
            ])
            .await
            .unwrap();

        let query = Query {
            text: "anything".to_string(),
            embedding: vec![1.0, 0.0],
        };
        let picked = MmrStrategy::new(0.5, 3)
            .retrieve(&store, &query, usize::MAX / 2)
            .await
            .unwrap();
        assert_eq!(picked.len(), 2);
    }
}
