//! Ollama API client
//!
//! Implements both model capabilities against a local Ollama server:
//! - Completion: POST /api/generate (streamed or whole)
//! - Embedding: POST /api/embed
//!
//! Every call runs under the configured request deadline. Streams apply the
//! deadline to opening the response and to each wait for the next frame.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::Client;
use std::collections::VecDeque;
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::errors::{RagError, Result};
use crate::models::types::{
    EmbedRequest, EmbedResponse, GenerateChunk, GenerateOptions, GenerateRequest, ModelsResponse,
};
use crate::models::{with_deadline, ChunkStream, Embedder, Generator};
use crate::streaming::parser::FrameParser;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default completion model
pub const DEFAULT_MODEL: &str = "qwen2.5";

/// Default embedding model
pub const DEFAULT_EMBED_MODEL: &str = "bge-m3";

/// Connection establishment timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ollama client shared by ingestion and querying
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    embed_model: String,
    temperature: f32,
    num_ctx: usize,
    request_timeout: Duration,
}

impl OllamaClient {
    /// Create client with default settings
    pub fn new() -> Result<Self> {
        Self::from_config(&OllamaConfig::default())
    }

    /// Create client from the `[ollama]` configuration section
    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(RagError::HttpError)?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            model: config.llm_model.clone(),
            embed_model: config.embed_model.clone(),
            temperature: config.temperature,
            num_ctx: config.num_ctx,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn generate_request(&self, prompt: &str, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream,
            options: Some(GenerateOptions {
                temperature: self.temperature,
                num_ctx: self.num_ctx,
            }),
        }
    }

    async fn post_generate(&self, request: &GenerateRequest) -> Result<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| RagError::GenerationFailure(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::GenerationFailure(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/version", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// List installed models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RagError::Generic(format!("Failed to list models: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Generic(format!(
                "Failed to retrieve model list: HTTP {}",
                response.status()
            )));
        }

        let models_response: ModelsResponse = response.json().await?;

        Ok(models_response
            .models
            .into_iter()
            .map(|m| m.name)
            .collect())
    }

    /// Completion model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embedding model name
    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// Base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Generator for OllamaClient {
    fn context_window(&self) -> usize {
        self.num_ctx
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.generate_request(prompt, false);

        with_deadline("generation", self.request_timeout, async {
            let response = self.post_generate(&request).await?;
            let chunk: GenerateChunk = response
                .json()
                .await
                .map_err(|e| RagError::GenerationFailure(format!("Bad response body: {}", e)))?;

            match chunk.error {
                Some(error) => Err(RagError::GenerationFailure(error)),
                None => Ok(chunk.response),
            }
        })
        .await
    }

    async fn complete_stream(&self, prompt: &str) -> Result<ChunkStream> {
        let request = self.generate_request(prompt, true);

        let response = with_deadline(
            "generation stream",
            self.request_timeout,
            self.post_generate(&request),
        )
        .await?;

        Ok(frame_stream(response.bytes_stream().boxed(), self.request_timeout))
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let body: EmbedResponse = with_deadline("embedding", self.request_timeout, async {
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| RagError::EmbeddingFailure(format!("Failed to send request: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(RagError::EmbeddingFailure(format!(
                    "HTTP {}: {}",
                    status, error_text
                )));
            }

            response
                .json::<EmbedResponse>()
                .await
                .map_err(|e| RagError::EmbeddingFailure(format!("Bad response body: {}", e)))
        })
        .await?;

        if body.embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingFailure(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }

        Ok(body.embeddings)
    }
}

/// Decoder state threaded through the chunk stream
struct FrameState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: FrameParser,
    pending: VecDeque<Result<String>>,
    finished: bool,
    idle_timeout: Duration,
}

/// Turn the raw HTTP body into an ordered stream of response text
fn frame_stream(
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    idle_timeout: Duration,
) -> ChunkStream {
    let state = FrameState {
        bytes,
        parser: FrameParser::new(),
        pending: VecDeque::new(),
        finished: false,
        idle_timeout,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            let next = match tokio::time::timeout(state.idle_timeout, state.bytes.next()).await {
                Ok(next) => next,
                Err(_) => {
                    state.finished = true;
                    let err = RagError::Timeout {
                        operation: "generation stream".to_string(),
                        duration_ms: state.idle_timeout.as_millis() as u64,
                    };
                    return Some((Err(err), state));
                }
            };

            match next {
                None => {
                    state.finished = true;
                    let err = RagError::StreamingError(
                        "stream closed before the final frame".to_string(),
                    );
                    return Some((Err(err), state));
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(RagError::GenerationFailure(e.to_string())), state));
                }
                Some(Ok(bytes)) => match state.parser.push(&bytes) {
                    Ok(frames) => {
                        for frame in frames {
                            if let Some(error) = frame.error {
                                state.pending.push_back(Err(RagError::GenerationFailure(error)));
                                state.finished = true;
                                break;
                            }
                            if !frame.response.is_empty() {
                                state.pending.push_back(Ok(frame.response));
                            }
                            if frame.done {
                                state.finished = true;
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                },
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(parts: Vec<&'static str>) -> BoxStream<'static, reqwest::Result<Bytes>> {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes())))).boxed()
    }

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new().unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.embed_model(), DEFAULT_EMBED_MODEL);
        assert_eq!(client.base_url(), DEFAULT_OLLAMA_URL);
        assert_eq!(client.context_window(), 32768);
    }

    #[test]
    fn test_client_from_config() {
        let config = OllamaConfig {
            host: "localhost".to_string(),
            port: 11500,
            llm_model: "llama3.1:8b".to_string(),
            ..Default::default()
        };
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "llama3.1:8b");
        assert_eq!(client.base_url(), "http://localhost:11500");
    }

    #[tokio::test]
    async fn test_frame_stream_yields_tokens_in_order() {
        let stream = frame_stream(
            body(vec![
                "{\"response\":\"The \",\"done\":false}\n{\"resp",
                "onse\":\"cat \",\"done\":false}\n",
                "{\"response\":\"sat.\",\"done\":false}\n{\"response\":\"\",\"done\":true}\n",
            ]),
            Duration::from_secs(5),
        );

        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec!["The ", "cat ", "sat."]);
    }

    #[tokio::test]
    async fn test_frame_stream_truncated_body_is_error() {
        let stream = frame_stream(
            body(vec!["{\"response\":\"Partial\",\"done\":false}\n"]),
            Duration::from_secs(5),
        );

        let items: Vec<Result<String>> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Partial");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_frame_stream_error_frame() {
        let stream = frame_stream(
            body(vec!["{\"error\":\"out of memory\"}\n"]),
            Duration::from_secs(5),
        );

        let items: Vec<Result<String>> = stream.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(RagError::GenerationFailure(_))));
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Ollama
    async fn test_live_embedding() {
        let client = OllamaClient::new().unwrap();
        let vectors = client.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert!(!vectors[0].is_empty());
    }
}
