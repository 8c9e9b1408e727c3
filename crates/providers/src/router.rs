//! Generator router — selects the correct backend based on config.
//!
//! Handles backend creation and lookup by name.

use crate::openai_compat::OpenAiCompatGenerator;
use std::collections::HashMap;
use std::sync::Arc;
use taskforge_core::generation::TextGenerator;

/// Routes generation requests to the correct backend.
pub struct GeneratorRouter {
    backends: HashMap<String, Arc<dyn TextGenerator>>,
    default_backend: String,
}

impl GeneratorRouter {
    /// Create a new router with a default backend name.
    pub fn new(default_backend: impl Into<String>) -> Self {
        Self {
            backends: HashMap::new(),
            default_backend: default_backend.into(),
        }
    }

    /// Register a backend.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn TextGenerator>) {
        self.backends.insert(name.into(), backend);
    }

    /// Get the default backend.
    pub fn default(&self) -> Option<Arc<dyn TextGenerator>> {
        self.backends.get(&self.default_backend).cloned()
    }

    /// Get a specific backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TextGenerator>> {
        self.backends.get(name).cloned()
    }

    /// List all registered backend names.
    pub fn list(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }
}

/// Build backends from configuration.
pub fn build_from_config(config: &taskforge_config::AppConfig) -> GeneratorRouter {
    let mut router = GeneratorRouter::new(&config.default_provider);

    // Build backends from config
    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_else(|| placeholder_key(name));

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatGenerator::new(name, &base_url, &api_key)),
        );
    }

    // Ensure the default backend exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config
            .api_key
            .clone()
            .unwrap_or_else(|| placeholder_key(&config.default_provider));
        let base_url = default_base_url(&config.default_provider);

        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatGenerator::new(
                &config.default_provider,
                &base_url,
                &api_key,
            )),
        );
    }

    router
}

/// Whether a backend needs a real API key to be usable.
///
/// Locally-hosted servers accept any bearer token, so a missing key is not a
/// configuration error for them.
pub fn requires_api_key(provider_name: &str) -> bool {
    !matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Key to use when none is configured. Local servers get a placeholder so
/// they report a loaded model; everything else gets an empty key and fails
/// readiness until a real one is supplied.
fn placeholder_key(provider_name: &str) -> String {
    if requires_api_key(provider_name) {
        String::new()
    } else {
        provider_name.to_string()
    }
}

/// Get the default base URL for well-known backends.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
