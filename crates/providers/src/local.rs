//! Local inference backend — runs GGUF-quantized models on the host CPU
//! via [Candle](https://github.com/huggingface/candle), no API key required.
//!
//! Unlike the HTTP backends, the model here has real load/unload state: the
//! caller must `load()` before the first generation, and `has_loaded_model()`
//! reflects whether that happened. Generating against an unloaded model is
//! refused rather than triggering an implicit download.
//!
//! ```bash
//! taskforge run "Plan a product launch" --provider local --model tinyllama
//! ```

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama as qlm;
use hf_hub::api::sync::Api;
use std::path::Path;
use std::sync::Arc;
use taskforge_core::error::GenerationError;
use taskforge_core::generation::{Generation, GenerationRequest, TextGenerator, Usage};
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

// ── Preset catalog ─────────────────────────────────────────────────────

/// A known model: HuggingFace coordinates plus the prompt wrapper it expects.
struct GgufPreset {
    aliases: &'static [&'static str],
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
    style: PromptStyle,
}

/// How to wrap a bare prompt for the model's chat head.
#[derive(Debug, Clone, Copy)]
enum PromptStyle {
    /// `<|user|>\n{prompt}</s>\n<|assistant|>\n`
    TinyLlama,
    /// `<|im_start|>user\n{prompt}<|im_end|>\n<|im_start|>assistant\n`
    ChatMl,
}

/// Models small enough to run on laptop-class hardware. Alias lookup is
/// case-insensitive; anything not listed here must be a .gguf file path.
const PRESETS: &[GgufPreset] = &[
    GgufPreset {
        aliases: &["tinyllama", "tiny-llama", "tinyllama-1.1b"],
        repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
        gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
        tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        style: PromptStyle::TinyLlama,
    },
    GgufPreset {
        aliases: &["smollm", "smollm:135m", "smollm-135m"],
        repo: "TheBloke/SmolLM-135M-Instruct-GGUF",
        gguf_file: "smollm-135m-instruct.Q4_K_M.gguf",
        tokenizer_repo: "HuggingFaceTB/SmolLM-135M-Instruct",
        style: PromptStyle::ChatMl,
    },
    GgufPreset {
        aliases: &["smollm:360m", "smollm-360m"],
        repo: "TheBloke/SmolLM-360M-Instruct-GGUF",
        gguf_file: "smollm-360m-instruct.Q4_K_M.gguf",
        tokenizer_repo: "HuggingFaceTB/SmolLM-360M-Instruct",
        style: PromptStyle::ChatMl,
    },
    GgufPreset {
        aliases: &["smollm:1.7b", "smollm-1.7b"],
        repo: "TheBloke/SmolLM-1.7B-Instruct-GGUF",
        gguf_file: "smollm-1.7b-instruct.Q4_K_M.gguf",
        tokenizer_repo: "HuggingFaceTB/SmolLM-1.7B-Instruct",
        style: PromptStyle::ChatMl,
    },
    GgufPreset {
        aliases: &["phi2", "phi-2"],
        repo: "TheBloke/phi-2-GGUF",
        gguf_file: "phi-2.Q4_K_M.gguf",
        tokenizer_repo: "microsoft/phi-2",
        style: PromptStyle::ChatMl,
    },
    GgufPreset {
        aliases: &["qwen:0.5b", "qwen-0.5b", "qwen2-0.5b"],
        repo: "Qwen/Qwen2-0.5B-Instruct-GGUF",
        gguf_file: "qwen2-0_5b-instruct-q4_k_m.gguf",
        tokenizer_repo: "Qwen/Qwen2-0.5B-Instruct",
        style: PromptStyle::ChatMl,
    },
    GgufPreset {
        aliases: &["qwen:1.5b", "qwen-1.5b", "qwen2-1.5b"],
        repo: "Qwen/Qwen2-1.5B-Instruct-GGUF",
        gguf_file: "qwen2-1_5b-instruct-q4_k_m.gguf",
        tokenizer_repo: "Qwen/Qwen2-1.5B-Instruct",
        style: PromptStyle::ChatMl,
    },
];

fn resolve_preset(alias: &str) -> Option<&'static GgufPreset> {
    let needle = alias.to_lowercase();
    PRESETS
        .iter()
        .find(|preset| preset.aliases.contains(&needle.as_str()))
}

fn known_aliases() -> String {
    PRESETS
        .iter()
        .map(|preset| preset.aliases[0])
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Local generator ────────────────────────────────────────────────────

/// A generator that runs GGUF-quantized language models in-process.
///
/// The loaded model sits behind a Mutex: Candle CPU inference is
/// single-threaded, so requests serialize here anyway.
pub struct LocalGenerator {
    inner: Arc<Mutex<Option<LoadedModel>>>,
    model_name: String,
}

/// Weights, tokenizer, and decoding state for a model that finished loading.
struct LoadedModel {
    model: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    style: PromptStyle,
    eos_token_id: u32,
}

impl LocalGenerator {
    /// Create a generator in the unloaded state.
    ///
    /// `model_name` is either a preset alias (`"tinyllama"`, `"smollm:135m"`,
    /// `"phi2"`, ...) or a path to a .gguf file on disk.
    pub fn new(model_name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            model_name: model_name.to_string(),
        }
    }

    /// Download (if needed) and load the model into memory.
    ///
    /// Idempotent: loading while already loaded is a no-op.
    pub async fn load(&self) -> Result<(), GenerationError> {
        {
            let state = self.inner.lock().await;
            if state.is_some() {
                debug!(model = %self.model_name, "Model already loaded");
                return Ok(());
            }
        }

        info!(model = %self.model_name, "Loading local model");
        let name = self.model_name.clone();
        let loaded = tokio::task::spawn_blocking(move || LoadedModel::load(&name))
            .await
            .map_err(|e| GenerationError::ApiError {
                status_code: 500,
                message: format!("Model loading task failed: {e}"),
            })??;

        let mut state = self.inner.lock().await;
        *state = Some(loaded);
        Ok(())
    }

    /// Drop the loaded model, returning to the unloaded state.
    pub async fn unload(&self) {
        let mut state = self.inner.lock().await;
        if state.take().is_some() {
            info!(model = %self.model_name, "Local model unloaded");
        }
    }
}

impl LoadedModel {
    fn load(model_name: &str) -> Result<Self, GenerationError> {
        let device = Device::Cpu;

        if Path::new(model_name).exists() && model_name.ends_with(".gguf") {
            return Self::load_from_path(Path::new(model_name), &device);
        }

        let preset = resolve_preset(model_name).ok_or_else(|| {
            GenerationError::ModelNotFound(format!(
                "Unknown local model '{}'. Available presets: {}. \
                 Or provide a path to a .gguf file.",
                model_name,
                known_aliases()
            ))
        })?;

        info!(
            model = model_name,
            repo = preset.repo,
            file = preset.gguf_file,
            "Fetching model from HuggingFace Hub"
        );

        // hf-hub caches downloads under ~/.cache/huggingface
        let api = Api::new().map_err(|e| {
            GenerationError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;

        let model_path = api
            .model(preset.repo.to_string())
            .get(preset.gguf_file)
            .map_err(|e| {
                GenerationError::Network(format!(
                    "Failed to download model '{}' from '{}': {e}",
                    preset.gguf_file, preset.repo
                ))
            })?;

        info!(path = %model_path.display(), "Model file ready");

        let tokenizer_path = api
            .model(preset.tokenizer_repo.to_string())
            .get("tokenizer.json")
            .map_err(|e| {
                GenerationError::Network(format!(
                    "Failed to download tokenizer from '{}': {e}",
                    preset.tokenizer_repo
                ))
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            GenerationError::NotConfigured(format!("Failed to load tokenizer: {e}"))
        })?;

        let (model, eos_token_id) = Self::open_gguf(&model_path, &tokenizer, &device)?;

        info!(eos_token_id, "Local model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            style: preset.style,
            eos_token_id,
        })
    }

    /// Load from an explicit .gguf path, expecting `tokenizer.json` beside it.
    fn load_from_path(path: &Path, device: &Device) -> Result<Self, GenerationError> {
        info!(path = %path.display(), "Loading local GGUF model");

        let tokenizer_path = path.with_file_name("tokenizer.json");
        let tokenizer = if tokenizer_path.exists() {
            Tokenizer::from_file(&tokenizer_path).map_err(|e| {
                GenerationError::NotConfigured(format!("Failed to load tokenizer: {e}"))
            })?
        } else {
            warn!("No tokenizer.json next to GGUF file, falling back to TinyLlama tokenizer");
            let api = Api::new().map_err(|e| {
                GenerationError::Network(format!("HuggingFace Hub API error: {e}"))
            })?;
            let tok_path = api
                .model("TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string())
                .get("tokenizer.json")
                .map_err(|e| {
                    GenerationError::Network(format!("Failed to download fallback tokenizer: {e}"))
                })?;
            Tokenizer::from_file(&tok_path).map_err(|e| {
                GenerationError::NotConfigured(format!("Failed to load tokenizer: {e}"))
            })?
        };

        let (model, eos_token_id) = Self::open_gguf(path, &tokenizer, device)?;

        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
            style: PromptStyle::ChatMl,
            eos_token_id,
        })
    }

    /// Parse a GGUF file into model weights and determine the EOS token id.
    fn open_gguf(
        path: &Path,
        tokenizer: &Tokenizer,
        device: &Device,
    ) -> Result<(qlm::ModelWeights, u32), GenerationError> {
        let mut file = std::fs::File::open(path).map_err(|e| {
            GenerationError::NotConfigured(format!("Failed to open model file: {e}"))
        })?;

        let gguf = gguf_file::Content::read(&mut file).map_err(|e| {
            GenerationError::NotConfigured(format!("Failed to parse GGUF file: {e}"))
        })?;

        let model = qlm::ModelWeights::from_gguf(gguf, &mut file, device).map_err(|e| {
            GenerationError::NotConfigured(format!("Failed to load model weights: {e}"))
        })?;

        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| tokenizer.token_to_id("<|im_end|>"))
            .or_else(|| tokenizer.token_to_id("<|eot_id|>"))
            .unwrap_or(2); // common EOS id across llama-family vocabs

        Ok((model, eos_token_id))
    }

    fn wrap_prompt(&self, prompt: &str) -> String {
        match self.style {
            PromptStyle::TinyLlama => format!("<|user|>\n{prompt}</s>\n<|assistant|>\n"),
            PromptStyle::ChatMl => {
                format!("<|im_start|>user\n{prompt}<|im_end|>\n<|im_start|>assistant\n")
            }
        }
    }

    /// Tokenize, generate up to `max_tokens`, decode.
    ///
    /// Returns (output text, prompt token count, completion token count).
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        top_p: f32,
    ) -> Result<(String, u32, u32), GenerationError> {
        let encoding =
            self.tokenizer
                .encode(prompt, true)
                .map_err(|e| GenerationError::ApiError {
                    status_code: 500,
                    message: format!("Tokenization failed: {e}"),
                })?;

        let prompt_tokens = encoding.get_ids();
        let prompt_token_count = prompt_tokens.len() as u32;

        debug!(
            prompt_tokens = prompt_token_count,
            max_tokens,
            temperature,
            top_p,
            "Starting local generation"
        );

        let mut logits_processor = if temperature <= 0.0 {
            LogitsProcessor::new(42, None, None)
        } else {
            LogitsProcessor::new(42, Some(temperature as f64), Some(top_p as f64))
        };

        // Prompt pass: feed the whole prompt at position 0, sample one token.
        // quantized_llama::forward returns logits for the last position only.
        let input = Tensor::new(prompt_tokens, &self.device)
            .map_err(map_candle_err)?
            .unsqueeze(0)
            .map_err(map_candle_err)?;
        let logits = self.model.forward(&input, 0).map_err(map_candle_err)?;
        let logits = logits.squeeze(0).map_err(map_candle_err)?;
        let mut next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;

        let mut generated_tokens: Vec<u32> = Vec::new();
        if next_token != self.eos_token_id {
            generated_tokens.push(next_token);

            // Decode pass: one token at a time against the KV cache. The
            // position offset is relative to everything already in the cache.
            for step in 1..max_tokens as usize {
                let input = Tensor::new(&[next_token][..], &self.device)
                    .map_err(map_candle_err)?
                    .unsqueeze(0)
                    .map_err(map_candle_err)?;
                let logits = self
                    .model
                    .forward(&input, prompt_tokens.len() + step - 1)
                    .map_err(map_candle_err)?;
                let logits = logits.squeeze(0).map_err(map_candle_err)?;
                next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;
                if next_token == self.eos_token_id {
                    break;
                }
                generated_tokens.push(next_token);
            }
        }

        let completion_token_count = generated_tokens.len() as u32;

        let output = self
            .tokenizer
            .decode(&generated_tokens, true)
            .map_err(|e| GenerationError::ApiError {
                status_code: 500,
                message: format!("Detokenization failed: {e}"),
            })?;

        debug!(
            completion_tokens = completion_token_count,
            output_len = output.len(),
            "Generation complete"
        );

        Ok((output, prompt_token_count, completion_token_count))
    }
}

fn map_candle_err(e: candle_core::Error) -> GenerationError {
    GenerationError::ApiError {
        status_code: 500,
        message: format!("Candle inference error: {e}"),
    }
}

// ── TextGenerator implementation ───────────────────────────────────────

#[async_trait]
impl TextGenerator for LocalGenerator {
    fn name(&self) -> &str {
        "local"
    }

    /// Reflects the actual load state; there is no lazy load on generate.
    async fn has_loaded_model(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Generation, GenerationError> {
        {
            let state = self.inner.lock().await;
            if state.is_none() {
                return Err(GenerationError::NotConfigured(format!(
                    "Local model '{}' is not loaded; call load() first",
                    self.model_name
                )));
            }
        }

        let max_tokens = request.options.max_tokens;
        let temperature = request.options.temperature;
        let top_p = request.options.top_p;
        let prompt = request.prompt.clone();
        let model_label = request.model.clone();

        // Inference is CPU-bound, keep it off the async workers
        let inner = self.inner.clone();
        let (output, prompt_tokens, completion_tokens) = tokio::task::spawn_blocking(move || {
            let mut guard = inner.blocking_lock();
            let state = guard.as_mut().ok_or_else(|| {
                GenerationError::NotConfigured(
                    "Local model was unloaded before generation started".to_string(),
                )
            })?;
            let wrapped = state.wrap_prompt(&prompt);
            state.generate(&wrapped, max_tokens, temperature, top_p)
        })
        .await
        .map_err(|e| GenerationError::ApiError {
            status_code: 500,
            message: format!("Inference task panicked: {e}"),
        })??;

        // Strip any trailing special tokens the decode left behind
        let clean_output = output
            .trim()
            .trim_end_matches("</s>")
            .trim_end_matches("<|im_end|>")
            .trim_end_matches("<|eot_id|>")
            .trim()
            .to_string();

        Ok(Generation {
            text: clean_output,
            model: format!("local/{}", model_label),
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }
}
