//! Corpus loader
//!
//! Walks one directory (non-recursively), keeps files with a supported
//! extension and turns each into a `Document`. A failure on one file is
//! recorded in the `IngestionReport` and never stops the pass.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::corpus::parsers::{DocumentParser, DocxParser, PdfParser};
use crate::errors::RagError;

/// Recognized document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    Text,
    Markdown,
    Doc,
    Docx,
    Pdf,
}

impl DocumentFormat {
    /// Format for a path, by case-insensitive extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "md" => Some(Self::Markdown),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Formats the loader decodes directly as UTF-8
    pub fn is_plain_text(&self) -> bool {
        matches!(self, Self::Text | Self::Markdown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }
}

/// A successfully read source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// File name, used as the source identifier
    pub source: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
}

/// What happened to one directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Loaded { chars: usize },
    SkippedEmpty,
    SkippedUnsupported { reason: String },
    FailedDecode { reason: String },
    Failed { reason: String },
}

/// Per-file detail line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Counters and per-file detail for one loader pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub loaded: usize,
    pub skipped_empty: usize,
    pub skipped_unsupported: usize,
    pub failed_decode: usize,
    pub failed_other: usize,
    pub files: Vec<FileOutcome>,
}

impl IngestionReport {
    /// Record one file and bump its counter
    pub fn record(&mut self, path: PathBuf, status: FileStatus) {
        match &status {
            FileStatus::Loaded { .. } => self.loaded += 1,
            FileStatus::SkippedEmpty => self.skipped_empty += 1,
            FileStatus::SkippedUnsupported { .. } => self.skipped_unsupported += 1,
            FileStatus::FailedDecode { .. } => self.failed_decode += 1,
            FileStatus::Failed { .. } => self.failed_other += 1,
        }
        self.files.push(FileOutcome { path, status });
    }

    /// Files that failed for any reason
    pub fn failed(&self) -> usize {
        self.failed_decode + self.failed_other
    }

    /// Files considered in this pass
    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// True when no file was considered at all
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "loaded {}, empty {}, unsupported {}, decode failures {}, other failures {}",
            self.loaded,
            self.skipped_empty,
            self.skipped_unsupported,
            self.failed_decode,
            self.failed_other
        )
    }
}

/// Directory loader with pluggable structured-format parsers
pub struct CorpusLoader {
    parsers: Vec<Arc<dyn DocumentParser>>,
}

impl CorpusLoader {
    /// Loader with the built-in PDF and Word parsers
    pub fn new() -> Self {
        Self {
            parsers: vec![Arc::new(PdfParser), Arc::new(DocxParser)],
        }
    }

    /// Loader that only understands plain text and markdown
    pub fn plain_text_only() -> Self {
        Self { parsers: Vec::new() }
    }

    /// Register an additional parser; later registrations win
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parsers.insert(0, parser);
        self
    }

    fn parser_for(&self, format: DocumentFormat) -> Option<&Arc<dyn DocumentParser>> {
        self.parsers.iter().find(|p| p.formats().contains(&format))
    }

    /// Load every supported file in `directory`
    ///
    /// A missing directory is not an error: the report is simply empty.
    pub async fn load(&self, directory: &Path) -> (Vec<Document>, IngestionReport) {
        let mut documents = Vec::new();
        let mut report = IngestionReport::default();

        let mut paths = match list_regular_files(directory).await {
            Ok(paths) => paths,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %directory.display(), "document directory does not exist");
                return (documents, report);
            }
            Err(e) => {
                error!(dir = %directory.display(), error = %e, "cannot read document directory");
                return (documents, report);
            }
        };
        paths.sort();

        info!(dir = %directory.display(), files = paths.len(), "loading documents");

        for path in paths {
            let status = match self.load_file(&path).await {
                Ok(doc) => {
                    let chars = doc.content.chars().count();
                    info!(file = %doc.source, chars, "loaded");
                    documents.push(doc);
                    FileStatus::Loaded { chars }
                }
                Err(status) => {
                    log_skip(&path, &status);
                    status
                }
            };
            report.record(path, status);
        }

        info!("document loading finished: {}", report.summary());
        (documents, report)
    }

    async fn load_file(&self, path: &Path) -> std::result::Result<Document, FileStatus> {
        let format = match DocumentFormat::from_path(path) {
            Some(format) => format,
            None => {
                return Err(FileStatus::SkippedUnsupported {
                    reason: "extension not supported".to_string(),
                })
            }
        };

        let parser = if format.is_plain_text() {
            None
        } else {
            match self.parser_for(format) {
                Some(parser) => Some(parser.clone()),
                None => {
                    return Err(FileStatus::SkippedUnsupported {
                        reason: format!("no parser registered for {}", format.as_str()),
                    })
                }
            }
        };

        let bytes = tokio::fs::read(path).await.map_err(|e| FileStatus::Failed {
            reason: e.to_string(),
        })?;

        let content = match parser {
            None => decode_utf8(bytes).map_err(|reason| FileStatus::FailedDecode { reason })?,
            Some(parser) => parser.parse(path, bytes).await.map_err(|e| match e {
                RagError::DecodeFailure { reason, .. } => FileStatus::FailedDecode { reason },
                RagError::UnsupportedFormat { reason, .. } => {
                    FileStatus::SkippedUnsupported { reason }
                }
                other => FileStatus::Failed {
                    reason: other.to_string(),
                },
            })?,
        };

        if content.trim().is_empty() {
            return Err(FileStatus::SkippedEmpty);
        }

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Document {
            content,
            source,
            path: path.to_path_buf(),
            format,
        })
    }
}

impl Default for CorpusLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Regular files directly inside `directory` (symlinks followed)
async fn list_regular_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => debug!(path = %path.display(), "skipping non-file entry"),
            Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable entry"),
        }
    }

    Ok(files)
}

/// Strict UTF-8 decode, dropping a leading byte-order mark
fn decode_utf8(bytes: Vec<u8>) -> std::result::Result<String, String> {
    let mut text = String::from_utf8(bytes).map_err(|e| e.utf8_error().to_string())?;
    if text.starts_with('\u{feff}') {
        text.remove(0);
    }
    Ok(text)
}

fn log_skip(path: &Path, status: &FileStatus) {
    let file = path.display();
    match status {
        FileStatus::SkippedEmpty => warn!(%file, "file is empty, skipping"),
        FileStatus::SkippedUnsupported { reason } => debug!(%file, %reason, "skipping"),
        FileStatus::FailedDecode { reason } => warn!(%file, %reason, "encoding error, skipping"),
        FileStatus::Failed { reason } => error!(%file, %reason, "failed to load"),
        FileStatus::Loaded { .. } => {}
    }
}
