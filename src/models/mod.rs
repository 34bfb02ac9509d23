//! Model capabilities
//!
//! The pipeline talks to two external model services: one that maps text to
//! vectors and one that completes prompts. Both are traits so the store,
//! the query engine and the tests can be wired to any implementation.

pub mod types;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::future::Future;
use std::time::Duration;

use crate::errors::{RagError, Result};

/// Ordered stream of generated text chunks
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// Text → vector capability
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::EmbeddingFailure("embedder returned no vector".to_string()))
    }
}

/// Prompt → text capability
#[async_trait]
pub trait Generator: Send + Sync {
    /// Whether `complete_stream` yields incremental chunks
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Maximum prompt + answer size in tokens
    fn context_window(&self) -> usize;

    /// Generate the complete answer in one response
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Generate the answer as an ordered chunk stream
    async fn complete_stream(&self, prompt: &str) -> Result<ChunkStream>;
}

/// Run `fut` under a deadline, mapping expiry to `RagError::Timeout`
pub async fn with_deadline<T, F>(operation: &str, deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout {
            operation: operation.to_string(),
            duration_ms: deadline.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_expiry_is_timeout() {
        let result: Result<()> = with_deadline("generation", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        match result {
            Err(RagError::Timeout { operation, duration_ms }) => {
                assert_eq!(operation, "generation");
                assert_eq!(duration_ms, 10);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_passes_inner_error_through() {
        let result: Result<()> = with_deadline("embedding", Duration::from_secs(1), async {
            Err(RagError::EmbeddingFailure("model not found".into()))
        })
        .await;

        assert!(matches!(result, Err(RagError::EmbeddingFailure(_))));
    }
}
