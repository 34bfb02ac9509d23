//! Shared fakes for integration tests
//!
//! Nothing here talks to Ollama or Qdrant.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ollamarag::corpus::Document;
use ollamarag::models::{ChunkStream, Embedder, Generator};
use ollamarag::store::{
    InsertReport, KnowledgeIndex, KnowledgeStoreAdapter, LocalStore, ScoredChunk, StoredChunk,
    VectorStore,
};
use ollamarag::{RagError, Result};

pub const DIM: usize = 16;

/// Deterministic embedder: registered texts map to fixed vectors, anything
/// else to a normalized bag-of-words hash.
#[derive(Default)]
pub struct FakeEmbedder {
    fixed: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.to_string(), vector);
        self
    }

    fn hash_embed(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let bucket = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            v[bucket % DIM] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        } else {
            v[0] = 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                self.fixed
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| Self::hash_embed(t))
            })
            .collect())
    }
}

/// Generator with a scripted stream and a fixed non-streaming answer
pub struct ScriptedGenerator {
    stream_chunks: Vec<String>,
    /// Error raised after the scripted chunks, if any
    stream_error: Option<String>,
    /// Error raised when opening the stream, if any
    open_error: Option<String>,
    /// Error raised by `complete`, if any
    complete_error: Option<String>,
    complete_answer: String,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(stream_chunks: &[&str], complete_answer: &str) -> Self {
        Self {
            stream_chunks: stream_chunks.iter().map(|s| s.to_string()).collect(),
            stream_error: None,
            open_error: None,
            complete_error: None,
            complete_answer: complete_answer.to_string(),
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail the stream after the scripted chunks
    pub fn failing_after_chunks(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }

    /// Fail before any chunk is produced
    pub fn failing_to_open(mut self, message: &str) -> Self {
        self.open_error = Some(message.to_string());
        self
    }

    /// Fail every non-streaming call
    pub fn failing_complete(mut self, message: &str) -> Self {
        self.complete_error = Some(message.to_string());
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn context_window(&self) -> usize {
        4096
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.complete_error {
            Some(ref message) => Err(RagError::GenerationFailure(message.clone())),
            None => Ok(self.complete_answer.clone()),
        }
    }

    async fn complete_stream(&self, prompt: &str) -> Result<ChunkStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(ref message) = self.open_error {
            return Err(RagError::GenerationFailure(message.clone()));
        }

        let mut items: Vec<Result<String>> =
            self.stream_chunks.iter().cloned().map(Ok).collect();
        if let Some(ref message) = self.stream_error {
            items.push(Err(RagError::StreamingError(message.clone())));
        }
        Ok(stream::iter(items).boxed())
    }
}

/// Counts calls to `insert_batch` on the wrapped index
pub struct SpyIndex {
    inner: Arc<dyn KnowledgeIndex>,
    pub inserts: AtomicUsize,
}

impl SpyIndex {
    pub fn new(inner: Arc<dyn KnowledgeIndex>) -> Self {
        Self {
            inner,
            inserts: AtomicUsize::new(0),
        }
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeIndex for SpyIndex {
    async fn record_count(&self) -> Result<u64> {
        self.inner.record_count().await
    }

    async fn stored_sources(&self) -> Result<BTreeSet<String>> {
        self.inner.stored_sources().await
    }

    async fn ingestion_complete(&self) -> Result<bool> {
        self.inner.ingestion_complete().await
    }

    async fn mark_ingestion_complete(&self, complete: bool) -> Result<()> {
        self.inner.mark_ingestion_complete(complete).await
    }

    async fn insert_batch(&self, documents: Vec<Document>) -> Result<InsertReport> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_batch(documents).await
    }
}

/// Local store whose writes start failing after `ok_writes` upserts
pub struct FailingStore {
    inner: LocalStore,
    ok_writes: usize,
    writes: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: LocalStore, ok_writes: usize) -> Self {
        Self {
            inner,
            ok_writes,
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for FailingStore {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    fn collection(&self) -> &str {
        self.inner.collection()
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn upsert(&self, chunks: Vec<StoredChunk>) -> Result<()> {
        if self.writes.fetch_add(1, Ordering::SeqCst) >= self.ok_writes {
            return Err(RagError::StoreUnavailable("disk full".to_string()));
        }
        self.inner.upsert(chunks).await
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        self.inner.search(embedding, limit).await
    }

    async fn sources(&self) -> Result<BTreeSet<String>> {
        self.inner.sources().await
    }

    async fn is_complete(&self) -> Result<bool> {
        self.inner.is_complete().await
    }

    async fn set_complete(&self, complete: bool) -> Result<()> {
        self.inner.set_complete(complete).await
    }
}

/// Local store under `dir` with the default collection name
pub async fn local_store(dir: &Path) -> Arc<LocalStore> {
    Arc::new(LocalStore::open(dir, "my_collection").await.unwrap())
}

/// Adapter over a fresh local store under `dir`
pub async fn local_adapter(dir: &Path, embedder: Arc<FakeEmbedder>) -> Arc<KnowledgeStoreAdapter> {
    let store: Arc<dyn VectorStore> = local_store(dir).await;
    Arc::new(KnowledgeStoreAdapter::new(store, embedder))
}

/// Stored chunk with a fixed embedding
pub fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> StoredChunk {
    StoredChunk {
        id: id.to_string(),
        document_id: format!("doc-{}", id),
        source: format!("{}.txt", id),
        chunk_index: 0,
        text: text.to_string(),
        embedding,
        metadata: HashMap::new(),
    }
}
