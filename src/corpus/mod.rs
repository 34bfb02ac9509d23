//! Document corpus ingestion
//!
//! Reads a directory of source files into `Document`s with an
//! `IngestionReport` describing what happened to every file.

pub mod loader;
pub mod parsers;

pub use loader::{CorpusLoader, Document, DocumentFormat, FileOutcome, FileStatus, IngestionReport};
pub use parsers::{DocumentParser, DocxParser, PdfParser};
