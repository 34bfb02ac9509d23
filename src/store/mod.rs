//! Knowledge store
//!
//! Persisted chunk storage behind the `VectorStore` trait, plus the adapter
//! that turns documents into embedded chunks and hands out retrievers.
//!
//! Backends:
//! - `LocalStore`: JSONL file per collection, graph-capable (default)
//! - `QdrantStore`: Qdrant collection, vector search only

pub mod adapter;
pub mod graph;
pub mod local;
pub mod marker;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::errors::Result;

pub use adapter::{InsertReport, KnowledgeIndex, KnowledgeStoreAdapter, StoreStatus};
pub use graph::{Community, KnowledgeGraph};
pub use local::LocalStore;
pub use marker::CompletionMarker;
pub use qdrant::QdrantStore;

/// One embedded chunk as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    /// Source file name of the owning document
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
}

/// A chunk with its relevance to a query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Persisted store backend
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for status output
    fn backend(&self) -> &'static str;

    /// Collection this handle is bound to
    fn collection(&self) -> &str;

    /// Number of stored chunks; zero for a fresh store
    async fn count(&self) -> Result<u64>;

    /// Persist chunks in one durable write
    async fn upsert(&self, chunks: Vec<StoredChunk>) -> Result<()>;

    /// Top `limit` chunks by cosine similarity, best first, embeddings included
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Distinct source names with at least one stored chunk
    async fn sources(&self) -> Result<BTreeSet<String>>;

    /// Whether the last ingestion pass finished
    async fn is_complete(&self) -> Result<bool>;

    /// Record or clear a finished ingestion pass
    async fn set_complete(&self, complete: bool) -> Result<()>;

    /// Entity graph over the stored chunks, when the backend keeps one
    async fn graph(&self) -> Result<Option<Arc<KnowledgeGraph>>> {
        Ok(None)
    }
}

/// Open the backend selected by the `[store]` configuration
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend {
        StoreBackend::Local => {
            let store = LocalStore::open(&config.path, &config.collection).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Qdrant => {
            let store = QdrantStore::connect(
                &config.qdrant_url,
                &config.collection,
                config.embedding_dim,
                &config.path,
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}

/// Cosine similarity; 0.0 when either vector has no magnitude or sizes differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Sort best-first with a stable tie order
pub(crate) fn sort_by_score(results: &mut [ScoredChunk]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
