//! Re-ranking of retrieved candidates

pub mod scorer;

pub use scorer::{keyword_boost, EmbeddingRerankStrategy, DEFAULT_KEYWORD_BOOST};
