//! OpenAI-compatible generation backend.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Groq, Together AI,
//! Fireworks AI, and any endpoint exposing `/v1/chat/completions`.
//!
//! The pipeline sends one prompt per call, so the request body is always a
//! single user message — no conversation history, no streaming.

use async_trait::async_trait;
use serde::Deserialize;
use taskforge_core::error::GenerationError;
use taskforge_core::generation::{Generation, GenerationRequest, TextGenerator, Usage};
use tracing::{debug, warn};

/// A generator backed by an OpenAI-compatible HTTP endpoint.
///
/// One implementation covers nearly every hosted backend, since the
/// `/v1/chat/completions` shape has become the de-facto standard.
pub struct OpenAiCompatGenerator {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    /// Create a new OpenAI-compatible generator.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// OpenRouter, the default hosted backend.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// OpenAI directly.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// A local Ollama server, defaulting to its standard port.
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    /// Remote backends hold the model server-side; the only local
    /// prerequisite is a credential to reach them.
    async fn has_loaded_model(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Generation, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.options.temperature,
            "top_p": request.options.top_p,
            "max_tokens": request.options.max_tokens,
            "stream": false,
        });

        debug!(backend = %self.name, model = %request.model, "Sending generation request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(e.to_string())
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        match status {
            200 => {}
            429 => {
                return Err(GenerationError::RateLimited {
                    retry_after_secs: 5,
                });
            }
            401 | 403 => {
                return Err(GenerationError::AuthenticationFailed(
                    "Invalid API key or insufficient permissions".into(),
                ));
            }
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                warn!(status, body = %error_body, "Backend returned error");
                return Err(GenerationError::ApiError {
                    status_code: status,
                    message: error_body,
                });
            }
        }

        let api_response: ApiResponse =
            response
                .json()
                .await
                .map_err(|e| GenerationError::ApiError {
                    status_code: 200,
                    message: format!("Failed to parse response: {e}"),
                })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Generation {
            text: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            usage,
        })
    }
}

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
