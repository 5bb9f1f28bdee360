//! # Generation Service
//!
//! Contract for the external text/vision generation service that work item processors
//! call once or more per item. The transport is supplied by the host; the core adds a
//! timeout and bounded retries through [`RetryingGenerationClient`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod retry;

pub use retry::RetryingGenerationClient;

/// Model selection carried in a task's configuration under `model`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default, alias = "modelName", alias = "modelId")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Provider-specific settings passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: ModelConfig,
    /// Image references attached to a vision request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>, model: ModelConfig) -> Self {
        Self {
            prompt: prompt.into(),
            model,
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.images.push(image_ref.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerationResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Generation timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("Generation service rate limited: {0}")]
    RateLimited(String),
    #[error("Generation service error: {0}")]
    Service(String),
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    /// Whether the same request may succeed on another attempt
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_config_accepts_aliases() {
        let model: ModelConfig = serde_json::from_value(json!({
            "modelName": "qwen-vl",
            "provider": "ollama",
            "endpoint": "http://localhost:11434"
        }))
        .unwrap();
        assert_eq!(model.name, "qwen-vl");
        assert_eq!(model.provider.as_deref(), Some("ollama"));
        assert_eq!(model.extra["endpoint"], "http://localhost:11434");
    }

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Timeout { seconds: 1 }.is_transient());
        assert!(GenerationError::Service("502".into()).is_transient());
        assert!(!GenerationError::InvalidRequest("no model".into()).is_transient());
    }
}
