//! Incremental frame parser for streamed Ollama responses
//!
//! `/api/generate` with `stream: true` answers with one JSON object per
//! frame, but HTTP chunk boundaries do not line up with frame boundaries.
//! The parser buffers bytes and extracts every complete top-level object
//! with a single-pass bracket matcher that ignores braces inside strings.

use crate::errors::{RagError, Result};
use crate::models::types::GenerateChunk;

/// Maximum buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Incremental frame parser
#[derive(Debug)]
pub struct FrameParser {
    buffer: Vec<u8>,
    max_buffer_size: usize,
}

impl FrameParser {
    /// Create new parser with default settings
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    /// Create parser with custom buffer capacity
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Add bytes and return every frame completed by them, in order
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<GenerateChunk>> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(RagError::JsonParseError(format!(
                "Buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }

        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some((start, end)) = self.find_complete_object()? {
            let frame: GenerateChunk = serde_json::from_slice(&self.buffer[start..=end])
                .map_err(|e| RagError::JsonParseError(format!("Bad stream frame: {}", e)))?;
            self.buffer.drain(..=end);
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Locate the first complete top-level object in the buffer
    fn find_complete_object(&self) -> Result<Option<(usize, usize)>> {
        let mut depth: i64 = 0;
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }

            if byte == b'\\' && in_string {
                escape_next = true;
                continue;
            }

            if byte == b'"' {
                in_string = !in_string;
                continue;
            }

            if in_string {
                continue;
            }

            match byte {
                b'{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(RagError::JsonParseError(
                            "Mismatched braces: too many closing braces".to_string(),
                        ));
                    }
                    if depth == 0 {
                        if let Some(start) = start {
                            return Ok(Some((start, i)));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(None)
    }

    /// Bytes still waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// True when nothing but whitespace is buffered
    pub fn is_drained(&self) -> bool {
        self.buffer.iter().all(|b| b.is_ascii_whitespace())
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
