//! Context sizing
//!
//! Token estimation and document chunking used by ingestion and prompt
//! assembly.

pub mod chunker;
pub mod counter;

pub use chunker::{TextChunk, TextChunker, TokenSizer};
pub use counter::TokenCounter;
