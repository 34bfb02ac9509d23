//! Plain nearest-neighbour retrieval

use async_trait::async_trait;

use crate::errors::Result;
use crate::rag::retrieval::{Query, RetrievalStrategy};
use crate::store::{ScoredChunk, VectorStore};

/// Top-k by store similarity, no re-ranking
#[derive(Debug, Default, Clone, Copy)]
pub struct SimilarityStrategy;

#[async_trait]
impl RetrievalStrategy for SimilarityStrategy {
    fn name(&self) -> &'static str {
        "similarity"
    }

    async fn retrieve(
        &self,
        store: &dyn VectorStore,
        query: &Query,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        store.search(&query.embedding, k).await
    }
}
