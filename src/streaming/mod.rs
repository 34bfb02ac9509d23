//! Answer streaming
//!
//! Ollama HTTP client with an incremental NDJSON frame decoder, and the
//! adapter that delivers streamed or complete answers to an output sink.

pub mod adapter;
pub mod client;
pub mod parser;

pub use adapter::{BufferSink, OutputSink, ResponseAdapter, StdoutSink};
pub use client::{OllamaClient, DEFAULT_EMBED_MODEL, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
pub use parser::{FrameParser, MAX_BUFFER_SIZE};
