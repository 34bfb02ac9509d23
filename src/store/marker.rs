//! Ingestion completion marker
//!
//! A small JSON file next to the collection, written only after a full
//! ingestion pass has been persisted. A populated store without it was
//! interrupted part way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::errors::{RagError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarkerFile {
    collection: String,
    completed_at: DateTime<Utc>,
}

/// Marker file for one collection
#[derive(Debug, Clone)]
pub struct CompletionMarker {
    path: PathBuf,
    collection: String,
}

impl CompletionMarker {
    /// Marker for `collection` under `dir`, tagged with the backend name
    pub fn new(dir: &Path, backend: &str, collection: &str) -> Self {
        Self {
            path: dir.join(format!("{}.{}.complete", collection, backend)),
            collection: collection.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a readable marker for this collection exists
    pub async fn is_set(&self) -> Result<bool> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(false);
        }

        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unavailable("cannot read", e))?;
        match serde_json::from_str::<MarkerFile>(&raw) {
            Ok(marker) => Ok(marker.collection == self.collection),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable completion marker");
                Ok(false)
            }
        }
    }

    /// Write or remove the marker
    pub async fn set(&self, complete: bool) -> Result<()> {
        if !complete {
            if fs::try_exists(&self.path).await.unwrap_or(false) {
                fs::remove_file(&self.path)
                    .await
                    .map_err(|e| self.unavailable("cannot remove", e))?;
                debug!(path = %self.path.display(), "Cleared completion marker");
            }
            return Ok(());
        }

        let marker = MarkerFile {
            collection: self.collection.clone(),
            completed_at: Utc::now(),
        };
        let raw = serde_json::to_string_pretty(&marker)?;
        fs::write(&self.path, raw)
            .await
            .map_err(|e| self.unavailable("cannot write", e))?;
        debug!(path = %self.path.display(), "Wrote completion marker");
        Ok(())
    }

    fn unavailable(&self, action: &str, error: std::io::Error) -> RagError {
        RagError::StoreUnavailable(format!("{} {}: {}", action, self.path.display(), error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_and_clear() {
        let dir = TempDir::new().unwrap();
        let marker = CompletionMarker::new(dir.path(), "local", "docs");
        assert!(!marker.is_set().await.unwrap());

        marker.set(true).await.unwrap();
        assert!(marker.is_set().await.unwrap());
        assert!(marker.path().ends_with("docs.local.complete"));

        marker.set(false).await.unwrap();
        assert!(!marker.is_set().await.unwrap());
        // Clearing twice is fine
        marker.set(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_marker_counts_as_unset() {
        let dir = TempDir::new().unwrap();
        let marker = CompletionMarker::new(dir.path(), "local", "docs");
        std::fs::write(marker.path(), "not json").unwrap();
        assert!(!marker.is_set().await.unwrap());
    }
}
