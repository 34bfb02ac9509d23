//! ollamarag - retrieval-augmented question answering over local documents
//!
//! Documents in a directory are chunked, embedded with Ollama and persisted
//! once; later runs reuse the store. Queries retrieve passages with one of
//! several strategies and stream the model's answer, falling back to a
//! single non-streaming call when the stream fails.

pub mod cli;
pub mod config;
pub mod context;
pub mod corpus;
pub mod errors;
pub mod index;
pub mod logging;
pub mod models;
pub mod rag;
pub mod repl;
pub mod store;
pub mod streaming;

pub use errors::{RagError, Result};
