//! Parsers for structured document formats
//!
//! Plain text and markdown are decoded by the loader itself. Everything else
//! goes through a `DocumentParser` registered for its format.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::corpus::loader::DocumentFormat;
use crate::errors::{RagError, Result};

/// Extracts text from one structured format
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Formats this parser accepts
    fn formats(&self) -> &[DocumentFormat];

    /// Extract the text content of a file
    async fn parse(&self, path: &Path, bytes: Vec<u8>) -> Result<String>;
}

/// PDF text-layer extraction
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

#[async_trait]
impl DocumentParser for PdfParser {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Pdf]
    }

    async fn parse(&self, path: &Path, bytes: Vec<u8>) -> Result<String> {
        let extraction = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map(|s| s.trim().to_string())
        })
        .await
        .map_err(|e| RagError::Generic(format!("PDF extraction task failed: {}", e)))?;

        extraction.map_err(|e| RagError::DecodeFailure {
            path: path.to_path_buf(),
            reason: format!("no readable text layer: {}", e),
        })
    }
}

/// Main part of a Word package
const DOCX_BODY: &str = "word/document.xml";

/// Word (.docx) body text
///
/// Reads `word/document.xml` out of the package and keeps the text runs.
/// Paragraphs become lines; tabs and breaks are kept as whitespace. Legacy
/// binary `.doc` files are not handled.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxParser;

#[async_trait]
impl DocumentParser for DocxParser {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Docx]
    }

    async fn parse(&self, path: &Path, bytes: Vec<u8>) -> Result<String> {
        let extraction = tokio::task::spawn_blocking(move || {
            let mut archive =
                zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a Word package: {}", e))?;
            let mut xml = String::new();
            archive
                .by_name(DOCX_BODY)
                .map_err(|e| format!("missing {}: {}", DOCX_BODY, e))?
                .read_to_string(&mut xml)
                .map_err(|e| format!("unreadable {}: {}", DOCX_BODY, e))?;
            docx_xml_to_text(&xml)
        })
        .await
        .map_err(|e| RagError::Generic(format!("DOCX extraction task failed: {}", e)))?;

        extraction.map_err(|reason| RagError::DecodeFailure {
            path: path.to_path_buf(),
            reason,
        })
    }
}

/// Text of a WordprocessingML body
fn docx_xml_to_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| format!("bad text run: {}", e))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
    }

    Ok(out.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> plan &amp; budget</w:t></w:r></w:p><w:p><w:r><w:t>Owner:</w:t><w:tab/><w:t>Ops</w:t></w:r></w:p></w:body></w:document>"#;

    fn package(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_xml_keeps_runs_and_paragraphs() {
        let text = docx_xml_to_text(BODY).unwrap();
        assert_eq!(text, "Quarterly plan & budget\nOwner:\tOps");
    }

    #[tokio::test]
    async fn test_docx_package_is_parsed() {
        let bytes = package(&[("[Content_Types].xml", "<Types/>"), (DOCX_BODY, BODY)]);
        let text = DocxParser.parse(Path::new("memo.docx"), bytes).await.unwrap();
        assert!(text.starts_with("Quarterly plan & budget"));
    }

    #[tokio::test]
    async fn test_package_without_body_is_a_decode_failure() {
        let bytes = package(&[("word/styles.xml", "<w:styles/>")]);
        let err = DocxParser
            .parse(Path::new("memo.docx"), bytes)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DecodeFailure { ref reason, .. } if reason.contains(DOCX_BODY)));
    }

    #[tokio::test]
    async fn test_non_zip_docx_is_rejected() {
        let result = DocxParser
            .parse(Path::new("memo.docx"), b"PK\x03\x04".to_vec())
            .await;
        assert!(matches!(result, Err(RagError::DecodeFailure { .. })));
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_rejected() {
        let parser = PdfParser;
        let result = parser
            .parse(Path::new("broken.pdf"), b"not a pdf at all".to_vec())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_parser_formats() {
        assert_eq!(PdfParser.formats(), &[DocumentFormat::Pdf]);
        assert_eq!(DocxParser.formats(), &[DocumentFormat::Docx]);
    }
}
