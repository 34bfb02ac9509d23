//! Query-capable store handle

use std::sync::Arc;
use tracing::debug;

use crate::errors::Result;
use crate::models::Embedder;
use crate::rag::retrieval::{strategy_for, Query, RetrievalStrategy};
use crate::rag::RetrievalConfig;
use crate::store::{ScoredChunk, VectorStore};

/// Store + embedder bound to one `RetrievalConfig`
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    strategy: Box<dyn RetrievalStrategy>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            strategy: strategy_for(&config),
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Embed `text` and return up to `top_k` chunks, best first
    pub async fn retrieve(&self, text: &str) -> Result<Vec<ScoredChunk>> {
        if self.config.top_k == 0 {
            return Ok(Vec::new());
        }

        let query = Query {
            text: text.to_string(),
            embedding: self.embedder.embed_one(text).await?,
        };

        let results = self
            .strategy
            .retrieve(self.store.as_ref(), &query, self.config.top_k)
            .await?;

        debug!(
            strategy = self.strategy.name(),
            hits = results.len(),
            "Retrieved context"
        );
        Ok(results)
    }
}
