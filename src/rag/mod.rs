//! Retrieval-augmented generation
//!
//! Components:
//! - Retrieval: one strategy per `RetrievalMode` behind a `Retriever`
//! - Re-ranking: embedding re-scoring with a lexical boost
//! - Context: passage rendering and token-budget packing
//! - Synthesis: compact / simple answer generation
//! - Pipeline: the `QueryEngine` tying them together

pub mod context;
pub mod pipeline;
pub mod reranking;
pub mod retrieval;
pub mod synthesis;

pub use context::{ContextBuilder, ContextFormat};
pub use pipeline::{QueryEngine, QueryResult, RetrievalConfig, MAX_TOP_K};
pub use reranking::EmbeddingRerankStrategy;
pub use retrieval::{
    GraphStrategy, GraphTraversal, MmrStrategy, Query, RetrievalMode, RetrievalStrategy,
    Retriever, SimilarityStrategy,
};
pub use synthesis::{ResponseMode, Synthesizer};
