//! End-to-end query pipeline: retrieve → assemble context → generate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::errors::Result;
use crate::models::{ChunkStream, Generator};
use crate::rag::retrieval::RetrievalMode;
use crate::rag::synthesis::{ResponseMode, Synthesizer};
use crate::store::KnowledgeStoreAdapter;

/// Largest accepted `top_k`
pub const MAX_TOP_K: usize = 100;

/// Per-query retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub mode: RetrievalMode,
    /// Chunks handed to synthesis
    pub top_k: usize,
    /// Stream the answer when the model supports it
    pub streaming: bool,
    pub response_mode: ResponseMode,
    /// MMR relevance weight in [0, 1]
    pub mmr_lambda: f32,
    /// Candidate pool size, as a multiple of `top_k`, for re-ranking modes
    pub candidate_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Default,
            top_k: 5,
            streaming: true,
            response_mode: ResponseMode::Compact,
            mmr_lambda: 0.5,
            candidate_multiplier: 3,
        }
    }
}

/// Answer shape chosen by the engine
pub enum QueryResult {
    /// Ordered text chunks, to be consumed once
    Streaming(ChunkStream),
    /// Whole answer
    Complete(String),
}

impl QueryResult {
    pub fn is_streaming(&self) -> bool {
        matches!(self, QueryResult::Streaming(_))
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Streaming(_) => f.write_str("Streaming(..)"),
            QueryResult::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
        }
    }
}

/// Retrieval-augmented query engine
pub struct QueryEngine {
    knowledge: Arc<KnowledgeStoreAdapter>,
    synthesizer: Synthesizer,
}

impl QueryEngine {
    pub fn new(knowledge: Arc<KnowledgeStoreAdapter>, generator: Arc<dyn Generator>) -> Self {
        Self {
            knowledge,
            synthesizer: Synthesizer::new(generator),
        }
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeStoreAdapter> {
        &self.knowledge
    }

    /// Answer `text` using the settings in `config`
    pub async fn query(&self, text: &str, config: &RetrievalConfig) -> Result<QueryResult> {
        let retriever = self.knowledge.as_retriever(config);
        let chunks = retriever.retrieve(text).await?;

        info!(
            mode = %config.mode,
            retrieved = chunks.len(),
            streaming = config.streaming,
            "Answering query"
        );

        self.synthesizer
            .synthesize(text, &chunks, config.response_mode, config.streaming)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetrievalConfig::default();
        assert_eq!(config.mode, RetrievalMode::Default);
        assert_eq!(config.response_mode, ResponseMode::Compact);
        assert!(config.streaming);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: RetrievalConfig = toml::from_str("mode = \"global\"\ntop_k = 8").unwrap();
        assert_eq!(config.mode, RetrievalMode::Global);
        assert_eq!(config.top_k, 8);
        assert_eq!(config.mmr_lambda, 0.5);
    }

    #[test]
    fn test_query_result_debug_hides_stream() {
        let result = QueryResult::Complete("hi".to_string());
        assert_eq!(format!("{:?}", result), "Complete(\"hi\")");
        assert!(!result.is_streaming());
    }
}
