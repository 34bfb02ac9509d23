//! Knowledge store adapter
//!
//! Bridges documents and the vector store: chunk, embed, persist. Documents
//! are ingested concurrently up to `max_concurrency`, each one written in a
//! single `upsert` so an interrupted run never leaves half a document behind.
//! An embedding failure only loses its own document; a store failure aborts
//! the batch. The store's completion marker is left to the index lifecycle.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::TextChunker;
use crate::corpus::Document;
use crate::errors::{RagError, Result};
use crate::models::Embedder;
use crate::rag::{RetrievalConfig, Retriever};
use crate::store::{StoredChunk, VectorStore};

/// Default number of documents embedded at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Texts per embedding request
const EMBED_BATCH_SIZE: usize = 32;

/// Outcome of one `insert_batch` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertReport {
    pub documents_inserted: usize,
    pub chunks_written: usize,
    /// (source, error) per document that could not be embedded
    pub documents_failed: Vec<(String, String)>,
}

impl InsertReport {
    pub fn summary(&self) -> String {
        format!(
            "{} documents inserted ({} chunks), {} failed",
            self.documents_inserted,
            self.chunks_written,
            self.documents_failed.len()
        )
    }
}

/// Store status for display
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStatus {
    pub backend: &'static str,
    pub collection: String,
    pub records: u64,
}

/// Population seam used by the index lifecycle
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Number of stored records
    async fn record_count(&self) -> Result<u64>;

    /// Whether the store already holds records; `false` for a fresh store
    async fn exists_and_populated(&self) -> Result<bool> {
        Ok(self.record_count().await? > 0)
    }

    /// Sources that already have chunks in the store
    async fn stored_sources(&self) -> Result<BTreeSet<String>>;

    /// Whether the last ingestion pass was recorded as finished
    async fn ingestion_complete(&self) -> Result<bool>;

    /// Record or clear a finished ingestion pass
    async fn mark_ingestion_complete(&self, complete: bool) -> Result<()>;

    /// Chunk, embed and persist documents
    async fn insert_batch(&self, documents: Vec<Document>) -> Result<InsertReport>;
}

/// Vector store plus embedder
pub struct KnowledgeStoreAdapter {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    semaphore: Arc<Semaphore>,
}

impl KnowledgeStoreAdapter {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            chunker: TextChunker::default(),
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
        }
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Query handle bound to `config`
    pub fn as_retriever(&self, config: &RetrievalConfig) -> Retriever {
        Retriever::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            config.clone(),
        )
    }

    pub async fn status(&self) -> Result<StoreStatus> {
        Ok(StoreStatus {
            backend: self.store.backend(),
            collection: self.store.collection().to_string(),
            records: self.store.count().await?,
        })
    }

    /// Embed one document's chunks; nothing is written here
    async fn prepare(&self, document: &Document) -> Result<Vec<StoredChunk>> {
        let pieces = self.chunker.chunk(&document.content);
        let texts: Vec<String> = pieces.iter().map(|p| p.text.clone()).collect();

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(self.embedder.embed(batch).await?);
        }
        if embeddings.len() != pieces.len() {
            return Err(RagError::EmbeddingFailure(format!(
                "expected {} vectors, got {}",
                pieces.len(),
                embeddings.len()
            )));
        }

        let document_id = Uuid::new_v4().to_string();
        let ingested_at = chrono::Utc::now().to_rfc3339();

        Ok(pieces
            .into_iter()
            .zip(embeddings)
            .map(|(piece, embedding)| {
                let mut metadata = HashMap::new();
                metadata.insert(
                    "format".to_string(),
                    JsonValue::String(document.format.as_str().to_string()),
                );
                metadata.insert(
                    "ingested_at".to_string(),
                    JsonValue::String(ingested_at.clone()),
                );

                StoredChunk {
                    id: Uuid::new_v4().to_string(),
                    document_id: document_id.clone(),
                    source: document.source.clone(),
                    chunk_index: piece.index,
                    text: piece.text,
                    embedding,
                    metadata,
                }
            })
            .collect())
    }
}

/// Per-document result inside a batch
enum DocumentResult {
    Written(usize),
    EmbeddingFailed(String),
    StoreFailed(RagError),
}

#[async_trait]
impl KnowledgeIndex for KnowledgeStoreAdapter {
    async fn record_count(&self) -> Result<u64> {
        self.store.count().await
    }

    async fn stored_sources(&self) -> Result<BTreeSet<String>> {
        self.store.sources().await
    }

    async fn ingestion_complete(&self) -> Result<bool> {
        self.store.is_complete().await
    }

    async fn mark_ingestion_complete(&self, complete: bool) -> Result<()> {
        self.store.set_complete(complete).await
    }

    async fn insert_batch(&self, documents: Vec<Document>) -> Result<InsertReport> {
        info!(documents = documents.len(), "Inserting documents");

        let tasks = documents.into_iter().map(|document| async move {
            let _permit = match self.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    return (
                        document.source,
                        DocumentResult::StoreFailed(RagError::Generic(e.to_string())),
                    )
                }
            };

            let chunks = match self.prepare(&document).await {
                Ok(chunks) => chunks,
                Err(e) => return (document.source, DocumentResult::EmbeddingFailed(e.to_string())),
            };

            let count = chunks.len();
            let result = match self.store.upsert(chunks).await {
                Ok(()) => DocumentResult::Written(count),
                Err(e) => DocumentResult::StoreFailed(e),
            };
            (document.source, result)
        });

        let mut report = InsertReport::default();
        let mut store_error = None;

        for (source, result) in join_all(tasks).await {
            match result {
                DocumentResult::Written(chunks) => {
                    debug!(%source, chunks, "Document stored");
                    report.documents_inserted += 1;
                    report.chunks_written += chunks;
                }
                DocumentResult::EmbeddingFailed(error) => {
                    warn!(%source, %error, "Document not embedded");
                    report.documents_failed.push((source, error));
                }
                DocumentResult::StoreFailed(error) => {
                    warn!(%source, %error, "Document not stored");
                    store_error.get_or_insert(error);
                }
            }
        }

        if let Some(error) = store_error {
            return Err(error);
        }

        info!("{}", report.summary());
        Ok(report)
    }
}
