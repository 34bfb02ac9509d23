//! File-backed vector store
//!
//! One JSONL file per collection under the store directory. Every `upsert`
//! appends its records as a single write followed by `sync_data`, so a crash
//! can at worst leave one truncated trailing line, which is skipped on open.
//! Records are held in memory for search; later lines win on duplicate ids.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::errors::{RagError, Result};
use crate::store::graph::KnowledgeGraph;
use crate::store::marker::CompletionMarker;
use crate::store::{cosine_similarity, sort_by_score, ScoredChunk, StoredChunk, VectorStore};

/// Local JSONL vector store
pub struct LocalStore {
    collection: String,
    file_path: PathBuf,
    marker: CompletionMarker,
    records: RwLock<Vec<StoredChunk>>,
    write_lock: Mutex<()>,
    graph: RwLock<Option<Arc<KnowledgeGraph>>>,
}

impl LocalStore {
    /// Open (or create) `collection` under `dir`
    pub async fn open(dir: &Path, collection: &str) -> Result<Self> {
        if collection.is_empty()
            || collection.contains(['/', '\\'])
            || collection.starts_with('.')
        {
            return Err(RagError::StoreUnavailable(format!(
                "invalid collection name '{}'",
                collection
            )));
        }

        fs::create_dir_all(dir).await.map_err(|e| {
            RagError::StoreUnavailable(format!(
                "cannot create store directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let file_path = dir.join(format!("{}.jsonl", collection));
        let records = if fs::try_exists(&file_path).await.unwrap_or(false) {
            let raw = fs::read_to_string(&file_path).await.map_err(|e| {
                RagError::StoreUnavailable(format!(
                    "cannot read {}: {}",
                    file_path.display(),
                    e
                ))
            })?;
            parse_records(&raw, &file_path)
        } else {
            Vec::new()
        };

        info!(
            collection,
            path = %file_path.display(),
            records = records.len(),
            "Opened local store"
        );

        Ok(Self {
            collection: collection.to_string(),
            file_path,
            marker: CompletionMarker::new(dir, "local", collection),
            records: RwLock::new(records),
            write_lock: Mutex::new(()),
            graph: RwLock::new(None),
        })
    }

    /// Backing JSONL file
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Parse JSONL content, last record wins per id
fn parse_records(raw: &str, path: &Path) -> Vec<StoredChunk> {
    let mut records: Vec<StoredChunk> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredChunk>(line) {
            Ok(record) => match positions.get(&record.id) {
                Some(&pos) => records[pos] = record,
                None => {
                    positions.insert(record.id.clone(), records.len());
                    records.push(record);
                }
            },
            Err(e) => warn!(
                path = %path.display(),
                line = line_no + 1,
                error = %e,
                "Skipping unreadable store record"
            ),
        }
    }

    records
}

#[async_trait]
impl VectorStore for LocalStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn upsert(&self, chunks: Vec<StoredChunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut buffer = String::new();
        for chunk in &chunks {
            buffer.push_str(&serde_json::to_string(chunk)?);
            buffer.push('\n');
        }

        let _guard = self.write_lock.lock().await;

        let write = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)
                .await?;
            file.write_all(buffer.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await
        };
        write.await.map_err(|e| {
            RagError::StoreUnavailable(format!(
                "cannot write {}: {}",
                self.file_path.display(),
                e
            ))
        })?;

        let written = chunks.len();
        {
            let mut records = self.records.write().await;
            for chunk in chunks {
                match records.iter().position(|r| r.id == chunk.id) {
                    Some(pos) => records[pos] = chunk,
                    None => records.push(chunk),
                }
            }
        }
        *self.graph.write().await = None;

        debug!(collection = %self.collection, written, "Appended records");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let records = self.records.read().await;
        let mut results: Vec<ScoredChunk> = records
            .iter()
            .map(|chunk| ScoredChunk {
                score: cosine_similarity(embedding, &chunk.embedding),
                chunk: chunk.clone(),
            })
            .collect();

        sort_by_score(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn sources(&self) -> Result<BTreeSet<String>> {
        let records = self.records.read().await;
        Ok(records.iter().map(|r| r.source.clone()).collect())
    }

    async fn is_complete(&self) -> Result<bool> {
        self.marker.is_set().await
    }

    async fn set_complete(&self, complete: bool) -> Result<()> {
        self.marker.set(complete).await
    }

    async fn graph(&self) -> Result<Option<Arc<KnowledgeGraph>>> {
        if let Some(graph) = self.graph.read().await.as_ref() {
            return Ok(Some(Arc::clone(graph)));
        }

        let snapshot = self.records.read().await.clone();
        let graph = Arc::new(KnowledgeGraph::build(snapshot));
        debug!(
            entities = graph.entity_count(),
            communities = graph.communities().len(),
            "Built knowledge graph"
        );

        *self.graph.write().await = Some(Arc::clone(&graph));
        Ok(Some(graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            source: format!("{}.txt", text),
            chunk_index: 0,
            text: text.to_string(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_fresh_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path(), "fresh").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.backend(), "local");
        assert_eq!(store.collection(), "fresh");
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = LocalStore::open(dir.path(), "c").await.unwrap();
            store
                .upsert(vec![
                    chunk("a", "first", vec![1.0, 0.0]),
                    chunk("b", "second", vec![0.0, 1.0]),
                ])
                .await
                .unwrap();
        }

        let reopened = LocalStore::open(dir.path(), "c").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path(), "c").await.unwrap();
        store.upsert(vec![chunk("a", "old", vec![1.0])]).await.unwrap();
        store.upsert(vec![chunk("a", "new", vec![1.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let reopened = LocalStore::open(dir.path(), "c").await.unwrap();
        let hits = reopened.search(&[1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "new");
    }

    #[tokio::test]
    async fn test_truncated_trailing_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path(), "c").await.unwrap();
        store.upsert(vec![chunk("a", "kept", vec![1.0])]).await.unwrap();

        let mut raw = std::fs::read_to_string(store.file_path()).unwrap();
        raw.push_str("{\"id\":\"b\",\"text\":\"cut");
        std::fs::write(store.file_path(), raw).unwrap();

        let reopened = LocalStore::open(dir.path(), "c").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path(), "c").await.unwrap();
        store
            .upsert(vec![
                chunk("far", "far", vec![0.0, 1.0]),
                chunk("near", "near", vec![1.0, 0.1]),
                chunk("mid", "mid", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_sources_and_completion_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = LocalStore::open(dir.path(), "c").await.unwrap();
            store
                .upsert(vec![
                    chunk("a", "first", vec![1.0]),
                    chunk("b", "first", vec![1.0]),
                    chunk("c", "second", vec![1.0]),
                ])
                .await
                .unwrap();
            assert!(!store.is_complete().await.unwrap());
            store.set_complete(true).await.unwrap();
        }

        let reopened = LocalStore::open(dir.path(), "c").await.unwrap();
        let sources: Vec<String> = reopened.sources().await.unwrap().into_iter().collect();
        assert_eq!(sources, vec!["first.txt", "second.txt"]);
        assert!(reopened.is_complete().await.unwrap());

        // Another collection in the same directory has its own marker
        let other = LocalStore::open(dir.path(), "other").await.unwrap();
        assert!(!other.is_complete().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_collection_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = LocalStore::open(dir.path(), "../escape").await;
        assert!(matches!(result, Err(RagError::StoreUnavailable(_))));
    }
}
