//! Text-generation service integration.
//!
//! The pipeline talks to [`TextGenerator`]; [`LlmClient`] implements it over
//! HTTP for OpenAI-compatible completion APIs and for Ollama.

mod client;

use async_trait::async_trait;

pub use client::{LlmClient, LlmConfig, LlmError, LlmProvider};

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
}

impl GenerationRequest {
    /// Request with temperature pinned to zero, so repeated runs over the
    /// same input are as reproducible as the service allows.
    pub fn deterministic(prompt: String, model: impl Into<String>) -> Self {
        Self {
            prompt,
            model: model.into(),
            temperature: 0.0,
        }
    }
}

/// Anything that turns a prompt into raw reply text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}
