//! Retrieval strategies
//!
//! Every `RetrievalMode` maps to one `RetrievalStrategy`. Strategies receive
//! the already-embedded query and rank chunks from the store.

pub mod engine;
pub mod graph;
pub mod mmr;
pub mod similarity;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{RagError, Result};
use crate::rag::reranking::EmbeddingRerankStrategy;
use crate::rag::RetrievalConfig;
use crate::store::{ScoredChunk, VectorStore};

pub use engine::Retriever;
pub use graph::{GraphStrategy, GraphTraversal};
pub use mmr::{mmr_select, MmrStrategy};
pub use similarity::SimilarityStrategy;

/// How chunks are selected for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Nearest neighbours by similarity
    #[default]
    Default,
    /// Larger candidate pool re-ranked against the query embedding
    Embedding,
    /// Maximal Marginal Relevance
    Mmr,
    /// Community-level graph summaries
    Global,
    /// Entity-neighbourhood graph expansion
    Local,
}

impl RetrievalMode {
    pub const ALL: [RetrievalMode; 5] = [
        RetrievalMode::Default,
        RetrievalMode::Embedding,
        RetrievalMode::Mmr,
        RetrievalMode::Global,
        RetrievalMode::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Default => "default",
            RetrievalMode::Embedding => "embedding",
            RetrievalMode::Mmr => "mmr",
            RetrievalMode::Global => "global",
            RetrievalMode::Local => "local",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        RetrievalMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                RagError::ConfigError(format!(
                    "unknown retrieval mode '{}' (expected default, embedding, mmr, global or local)",
                    s
                ))
            })
    }
}

/// An embedded query
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Ranks stored chunks for a query
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Up to `k` chunks, best first
    async fn retrieve(
        &self,
        store: &dyn VectorStore,
        query: &Query,
        k: usize,
    ) -> Result<Vec<ScoredChunk>>;
}

/// Strategy for the configured mode
pub fn strategy_for(config: &RetrievalConfig) -> Box<dyn RetrievalStrategy> {
    let pool = config.candidate_multiplier.max(1);
    match config.mode {
        RetrievalMode::Default => Box::new(SimilarityStrategy),
        RetrievalMode::Embedding => Box::new(EmbeddingRerankStrategy::new(pool)),
        RetrievalMode::Mmr => Box::new(MmrStrategy::new(config.mmr_lambda, pool)),
        RetrievalMode::Global => Box::new(GraphStrategy::new(GraphTraversal::Global)),
        RetrievalMode::Local => Box::new(GraphStrategy::new(GraphTraversal::Local)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing_is_case_insensitive() {
        assert_eq!("MMR".parse::<RetrievalMode>().unwrap(), RetrievalMode::Mmr);
        assert_eq!(" local ".parse::<RetrievalMode>().unwrap(), RetrievalMode::Local);
        assert!("hybrid".parse::<RetrievalMode>().is_err());
    }

    #[test]
    fn test_every_mode_has_a_strategy() {
        let expected = ["similarity", "embedding-rerank", "mmr", "graph-global", "graph-local"];
        for (mode, name) in RetrievalMode::ALL.into_iter().zip(expected) {
            let config = RetrievalConfig {
                mode,
                ..Default::default()
            };
            assert_eq!(strategy_for(&config).name(), name);
        }
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        let json = serde_json::to_string(&RetrievalMode::Embedding).unwrap();
        assert_eq!(json, "\"embedding\"");
    }
}
