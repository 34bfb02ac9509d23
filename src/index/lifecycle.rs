//! Index lifecycle
//!
//! Decides once per process whether the store must be built from the corpus
//! or can be reused. A populated store is never rebuilt: only an `Empty`
//! store is ingested, and the manager stays `Populated` afterwards.
//!
//! A build is recorded as finished with the store's completion marker once
//! `insert_batch` returns. A populated store without the marker was
//! interrupted; it is resumed by ingesting only the sources it lacks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::corpus::{CorpusLoader, IngestionReport};
use crate::errors::{RagError, Result};
use crate::store::{InsertReport, KnowledgeIndex};

/// Whether the store holds records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Populated,
}

/// What `start` did
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleOutcome {
    /// Existing store reused
    Loaded { records: u64 },
    /// Store built from the corpus
    Built {
        report: IngestionReport,
        insert: InsertReport,
    },
    /// Interrupted build finished; `missing` are the sources ingested now
    Resumed {
        report: IngestionReport,
        insert: InsertReport,
        missing: Vec<String>,
    },
    /// Corpus produced nothing to store
    BuiltEmpty { report: IngestionReport },
}

pub struct IndexLifecycleManager {
    index: Arc<dyn KnowledgeIndex>,
    loader: CorpusLoader,
    docs_dir: PathBuf,
    state: IndexState,
    started: bool,
}

impl IndexLifecycleManager {
    pub fn new(index: Arc<dyn KnowledgeIndex>, loader: CorpusLoader, docs_dir: PathBuf) -> Self {
        Self {
            index,
            loader,
            docs_dir,
            state: IndexState::Empty,
            started: false,
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// Reuse a populated store or build one from the corpus
    pub async fn start(&mut self) -> Result<LifecycleOutcome> {
        if self.started && self.state == IndexState::Populated {
            let records = self.index.record_count().await?;
            return Ok(LifecycleOutcome::Loaded { records });
        }
        self.started = true;

        if self.index.exists_and_populated().await? {
            if self.index.ingestion_complete().await? {
                let records = self.index.record_count().await?;
                info!(records, "Loading existing index");
                self.state = IndexState::Populated;
                return Ok(LifecycleOutcome::Loaded { records });
            }
            return self.resume().await;
        }

        info!(docs_dir = %self.docs_dir.display(), "Creating new index");
        self.index.mark_ingestion_complete(false).await?;
        let (documents, report) = self.loader.load(&self.docs_dir).await;

        if documents.is_empty() {
            warn!(
                docs_dir = %self.docs_dir.display(),
                "No documents loaded; queries will run without context"
            );
            return Ok(LifecycleOutcome::BuiltEmpty { report });
        }

        let insert = self.index.insert_batch(documents).await?;
        if insert.chunks_written == 0 {
            warn!("No chunks were stored; index stays empty");
            return Ok(LifecycleOutcome::BuiltEmpty { report });
        }

        self.index.mark_ingestion_complete(true).await?;
        self.state = IndexState::Populated;
        Ok(LifecycleOutcome::Built { report, insert })
    }

    /// Finish an interrupted build
    async fn resume(&mut self) -> Result<LifecycleOutcome> {
        let stored = self.index.stored_sources().await?;
        let (documents, report) = self.loader.load(&self.docs_dir).await;

        let pending: Vec<_> = documents
            .into_iter()
            .filter(|d| !stored.contains(&d.source))
            .collect();
        let missing: Vec<String> = pending.iter().map(|d| d.source.clone()).collect();

        if pending.is_empty() {
            info!(
                stored = stored.len(),
                "Previous ingestion was not marked finished but no source is missing"
            );
            self.index.mark_ingestion_complete(true).await?;
            self.state = IndexState::Populated;
            let records = self.index.record_count().await?;
            return Ok(LifecycleOutcome::Loaded { records });
        }

        warn!(
            missing = %missing.join(", "),
            "Previous ingestion was interrupted; ingesting missing documents"
        );
        let insert = self.index.insert_batch(pending).await?;
        self.index.mark_ingestion_complete(true).await?;
        self.state = IndexState::Populated;

        Ok(LifecycleOutcome::Resumed {
            report,
            insert,
            missing,
        })
    }
}

/// Create the document and store directories when missing
pub async fn ensure_directories(docs_dir: &Path, store_dir: &Path) -> Result<()> {
    for dir in [docs_dir, store_dir] {
        if fs::try_exists(dir).await.unwrap_or(false) {
            continue;
        }
        fs::create_dir_all(dir).await.map_err(|e| {
            RagError::IoError(std::io::Error::new(
                e.kind(),
                format!("cannot create {}: {}", dir.display(), e),
            ))
        })?;
        info!(path = %dir.display(), "Created directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Document;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingIndex {
        records: AtomicU64,
        inserts: AtomicUsize,
        complete: AtomicBool,
        sources: Mutex<BTreeSet<String>>,
        inserted: Mutex<Vec<String>>,
    }

    impl CountingIndex {
        /// Index that already holds `sources`, one record each
        fn holding(sources: &[&str], complete: bool) -> Self {
            let index = Self::default();
            index.records.store(sources.len() as u64, Ordering::SeqCst);
            index.complete.store(complete, Ordering::SeqCst);
            *index.sources.lock().unwrap() = sources.iter().map(|s| s.to_string()).collect();
            index
        }
    }

    #[async_trait]
    impl KnowledgeIndex for CountingIndex {
        async fn record_count(&self) -> Result<u64> {
            Ok(self.records.load(Ordering::SeqCst))
        }

        async fn stored_sources(&self) -> Result<BTreeSet<String>> {
            Ok(self.sources.lock().unwrap().clone())
        }

        async fn ingestion_complete(&self) -> Result<bool> {
            Ok(self.complete.load(Ordering::SeqCst))
        }

        async fn mark_ingestion_complete(&self, complete: bool) -> Result<()> {
            self.complete.store(complete, Ordering::SeqCst);
            Ok(())
        }

        async fn insert_batch(&self, documents: Vec<Document>) -> Result<InsertReport> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.records
                .fetch_add(documents.len() as u64, Ordering::SeqCst);
            for document in &documents {
                self.sources.lock().unwrap().insert(document.source.clone());
                self.inserted.lock().unwrap().push(document.source.clone());
            }
            Ok(InsertReport {
                documents_inserted: documents.len(),
                chunks_written: documents.len(),
                documents_failed: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_builds_then_stays_populated() {
        let docs = TempDir::new().unwrap();
        std::fs::write(docs.path().join("a.txt"), "Alpha.").unwrap();

        let index = Arc::new(CountingIndex::default());
        let mut manager =
            IndexLifecycleManager::new(index.clone(), CorpusLoader::new(), docs.path().into());

        let outcome = manager.start().await.unwrap();
        assert!(matches!(outcome, LifecycleOutcome::Built { .. }));
        assert_eq!(manager.state(), IndexState::Populated);
        assert!(index.complete.load(Ordering::SeqCst));

        let again = manager.start().await.unwrap();
        assert_eq!(again, LifecycleOutcome::Loaded { records: 1 });
        assert_eq!(index.inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_populated_store_skips_ingestion() {
        let docs = TempDir::new().unwrap();
        std::fs::write(docs.path().join("a.txt"), "Alpha.").unwrap();

        let index = Arc::new(CountingIndex::holding(&["a.txt"], true));
        index.records.store(7, Ordering::SeqCst);
        let mut manager =
            IndexLifecycleManager::new(index.clone(), CorpusLoader::new(), docs.path().into());

        assert_eq!(
            manager.start().await.unwrap(),
            LifecycleOutcome::Loaded { records: 7 }
        );
        assert_eq!(index.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unfinished_store_ingests_only_missing_sources() {
        let docs = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(docs.path().join(name), format!("Content of {}.", name)).unwrap();
        }

        let index = Arc::new(CountingIndex::holding(&["a.txt"], false));
        let mut manager =
            IndexLifecycleManager::new(index.clone(), CorpusLoader::new(), docs.path().into());

        match manager.start().await.unwrap() {
            LifecycleOutcome::Resumed { missing, insert, .. } => {
                assert_eq!(missing, vec!["b.txt", "c.txt"]);
                assert_eq!(insert.documents_inserted, 2);
            }
            other => panic!("expected a resume, got {:?}", other),
        }
        assert_eq!(*index.inserted.lock().unwrap(), vec!["b.txt", "c.txt"]);
        assert!(index.complete.load(Ordering::SeqCst));
        assert_eq!(manager.state(), IndexState::Populated);
    }

    #[tokio::test]
    async fn test_unfinished_store_with_nothing_missing_is_sealed() {
        let docs = TempDir::new().unwrap();
        std::fs::write(docs.path().join("a.txt"), "Alpha.").unwrap();

        let index = Arc::new(CountingIndex::holding(&["a.txt"], false));
        let mut manager =
            IndexLifecycleManager::new(index.clone(), CorpusLoader::new(), docs.path().into());

        assert_eq!(
            manager.start().await.unwrap(),
            LifecycleOutcome::Loaded { records: 1 }
        );
        assert_eq!(index.inserts.load(Ordering::SeqCst), 0);
        assert!(index.complete.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_corpus_stays_empty() {
        let root = TempDir::new().unwrap();
        let index = Arc::new(CountingIndex::default());
        let mut manager = IndexLifecycleManager::new(
            index.clone(),
            CorpusLoader::new(),
            root.path().join("missing"),
        );

        let outcome = manager.start().await.unwrap();
        assert!(matches!(outcome, LifecycleOutcome::BuiltEmpty { ref report } if report.loaded == 0));
        assert_eq!(manager.state(), IndexState::Empty);
        assert_eq!(index.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_directories_creates_both() {
        let root = TempDir::new().unwrap();
        let docs = root.path().join("docs");
        let store = root.path().join("rag_store");

        ensure_directories(&docs, &store).await.unwrap();
        assert!(docs.is_dir());
        assert!(store.is_dir());

        // Idempotent
        ensure_directories(&docs, &store).await.unwrap();
    }
}
