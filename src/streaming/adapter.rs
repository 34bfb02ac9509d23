//! Streaming response adapter
//!
//! Delivers a `QueryResult` to an `OutputSink` and returns the final text.
//! Stream chunks are forwarded as they arrive. If the stream cannot be
//! opened or fails part way, the sink is reset and the same query is asked
//! once more without streaming; a second failure is reported as a single
//! `GenerationFailure`.

use colored::*;
use futures_util::StreamExt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::warn;

use crate::errors::{RagError, Result};
use crate::rag::{QueryEngine, QueryResult, RetrievalConfig};

/// Destination for answer text
pub trait OutputSink: Send {
    /// Show one chunk of the answer
    fn emit(&mut self, chunk: &str);

    /// Discard everything emitted for the current answer
    fn reset(&mut self);

    /// The answer is complete
    fn finish(&mut self) {}
}

/// Writes answers to the terminal as they arrive
#[derive(Debug, Default)]
pub struct StdoutSink {
    emitted: bool,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for StdoutSink {
    fn emit(&mut self, chunk: &str) {
        print!("{}", chunk);
        io::stdout().flush().ok();
        self.emitted = true;
    }

    fn reset(&mut self) {
        if self.emitted {
            println!();
            println!("{}", "[stream interrupted, partial answer discarded]".dimmed());
        }
        self.emitted = false;
    }

    fn finish(&mut self) {
        if self.emitted {
            println!();
        }
        self.emitted = false;
    }
}

/// Collects chunks in memory
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    pub chunks: Vec<String>,
    pub resets: usize,
    pub finished: bool,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.chunks.concat()
    }
}

impl OutputSink for BufferSink {
    fn emit(&mut self, chunk: &str) {
        self.chunks.push(chunk.to_string());
    }

    fn reset(&mut self) {
        self.chunks.clear();
        self.resets += 1;
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

/// Runs queries and delivers their answers
pub struct ResponseAdapter {
    engine: Arc<QueryEngine>,
}

impl ResponseAdapter {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    /// Query the engine and deliver the answer
    pub async fn answer(
        &self,
        query: &str,
        config: &RetrievalConfig,
        sink: &mut dyn OutputSink,
    ) -> Result<String> {
        match self.engine.query(query, config).await {
            Ok(result) => self.deliver(query, result, config, sink).await,
            Err(e) if config.streaming && is_generation_error(&e) => {
                warn!(error = %e, "Could not open answer stream");
                sink.reset();
                self.fallback(query, config, sink, e).await
            }
            Err(e) => Err(e),
        }
    }

    /// Forward `result` to `sink` and return the full answer text
    pub async fn deliver(
        &self,
        query: &str,
        result: QueryResult,
        config: &RetrievalConfig,
        sink: &mut dyn OutputSink,
    ) -> Result<String> {
        match result {
            QueryResult::Complete(text) => {
                sink.emit(&text);
                sink.finish();
                Ok(text)
            }
            QueryResult::Streaming(mut stream) => {
                let mut answer = String::new();

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) => {
                            sink.emit(&chunk);
                            answer.push_str(&chunk);
                        }
                        Err(e) => {
                            warn!(error = %e, received = answer.len(), "Answer stream failed");
                            drop(stream);
                            sink.reset();
                            return self.fallback(query, config, sink, e).await;
                        }
                    }
                }

                sink.finish();
                Ok(answer)
            }
        }
    }

    /// The single non-streaming retry
    async fn fallback(
        &self,
        query: &str,
        config: &RetrievalConfig,
        sink: &mut dyn OutputSink,
        cause: RagError,
    ) -> Result<String> {
        let once = RetrievalConfig {
            streaming: false,
            ..config.clone()
        };

        let text = match self.engine.query(query, &once).await {
            Ok(QueryResult::Complete(text)) => text,
            Ok(QueryResult::Streaming(stream)) => {
                let parts: Vec<Result<String>> = stream.collect().await;
                parts.into_iter().collect::<Result<String>>().map_err(|e| {
                    RagError::GenerationFailure(format!(
                        "{}; retry without streaming also failed: {}",
                        cause, e
                    ))
                })?
            }
            Err(e) => {
                return Err(RagError::GenerationFailure(format!(
                    "{}; retry without streaming also failed: {}",
                    cause, e
                )))
            }
        };

        sink.emit(&text);
        sink.finish();
        Ok(text)
    }
}

/// Errors raised while producing the answer text
fn is_generation_error(error: &RagError) -> bool {
    matches!(
        error,
        RagError::GenerationFailure(_)
            | RagError::StreamingError(_)
            | RagError::JsonParseError(_)
            | RagError::HttpError(_)
            | RagError::Timeout { .. }
    )
}
