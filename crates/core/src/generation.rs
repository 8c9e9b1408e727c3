//! TextGenerator trait — the abstraction over text-generation backends.
//!
//! The pipeline needs exactly two things from a backend: answer whether a
//! model is ready, and turn one prompt into one completion. There is no
//! streaming surface — the pipeline awaits one call at a time.
//!
//! Implementations: OpenAI-compatible HTTP endpoints, local GGUF inference.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Sampling parameters for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Upper bound on completion length
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic, higher = more varied)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cutoff
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// A single-prompt generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier in the backend's own naming scheme
    /// ("anthropic/claude-sonnet-4", "qwen2.5:7b", ...)
    pub model: String,

    /// The full prompt text
    pub prompt: String,

    /// Sampling parameters
    #[serde(default)]
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// The generated text
    pub text: String,

    /// The model that actually answered, as reported by the backend
    pub model: String,

    /// Token usage, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token counts as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core text-generation trait.
///
/// Every backend implements this. The pipeline calls `has_loaded_model()`
/// once before a run and refuses to start when it answers false; after that
/// it calls `generate()` one prompt at a time — pure polymorphism, no
/// backend knowledge leaks into the pipeline.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// A human-readable name for this backend (e.g., "openrouter", "local").
    fn name(&self) -> &str;

    /// Whether a model is ready to serve requests.
    ///
    /// Remote backends hold the model server-side, so the default answer is
    /// yes; backends that manage model state override this.
    async fn has_loaded_model(&self) -> bool {
        true
    }

    /// Turn one prompt into one completion.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Generation, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.max_tokens, 1024);
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert!((opts.top_p - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn request_builder_overrides_options() {
        let req = GenerationRequest::new("gpt-4o", "hello").with_options(GenerationOptions {
            max_tokens: 256,
            temperature: 0.4,
            top_p: 0.95,
        });
        assert_eq!(req.model, "gpt-4o");
        assert_eq!(req.options.max_tokens, 256);
    }

    #[test]
    fn options_deserialize_fills_defaults() {
        let opts: GenerationOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.max_tokens, 1024);
    }
}
