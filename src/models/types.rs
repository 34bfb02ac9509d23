//! Wire types for the Ollama HTTP API

use serde::{Deserialize, Serialize};

/// POST /api/generate body
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Sampling and context options
#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_ctx: usize,
}

/// One frame of a streamed /api/generate response, or the whole
/// non-streamed response
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// POST /api/embed body
#[derive(Debug, Clone, Serialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: Vec<String>,
}

/// POST /api/embed response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

/// GET /api/tags response
#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// Installed model entry
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_frame_parses_without_response() {
        let chunk: GenerateChunk = serde_json::from_str(r#"{"model":"qwen2.5","done":true}"#).unwrap();
        assert!(chunk.done);
        assert!(chunk.response.is_empty());
    }

    #[test]
    fn test_request_omits_empty_options() {
        let request = GenerateRequest {
            model: "qwen2.5".to_string(),
            prompt: "hi".to_string(),
            stream: false,
            options: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("options"));
    }
}
