//! Configuration for taskforge: the `~/.taskforge/config.toml` file,
//! environment overrides on top of it, and validation of the result.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration, mirroring `~/.taskforge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global API key; a provider section may override it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Task-generation stage settings
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Task-execution stage settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("generator", &self.generator)
            .field("executor", &self.executor)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Sampling and sizing for the task-generation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_generator_temperature")]
    pub temperature: f32,

    #[serde(default = "default_generator_top_p")]
    pub top_p: f32,

    /// Lower bound on how many tasks to ask the model for
    #[serde(default = "default_min_tasks")]
    pub min_tasks: usize,

    /// Upper bound on how many tasks to ask the model for
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
}

fn default_generator_max_tokens() -> u32 {
    1024
}
fn default_generator_temperature() -> f32 {
    0.7
}
fn default_generator_top_p() -> f32 {
    0.9
}
fn default_min_tasks() -> usize {
    4
}
fn default_max_tasks() -> usize {
    7
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_generator_max_tokens(),
            temperature: default_generator_temperature(),
            top_p: default_generator_top_p(),
            min_tasks: default_min_tasks(),
            max_tasks: default_max_tasks(),
        }
    }
}

/// Sampling and pacing for the task-execution stage.
///
/// Executions want shorter, more focused completions than breakdowns, so
/// the defaults here deliberately differ from [`GeneratorConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_executor_temperature")]
    pub temperature: f32,

    #[serde(default = "default_executor_top_p")]
    pub top_p: f32,

    /// Pause between consecutive task executions, in milliseconds
    #[serde(default = "default_task_delay_ms")]
    pub task_delay_ms: u64,
}

fn default_executor_max_tokens() -> u32 {
    256
}
fn default_executor_temperature() -> f32 {
    0.4
}
fn default_executor_top_p() -> f32 {
    0.95
}
fn default_task_delay_ms() -> u64 {
    500
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_executor_max_tokens(),
            temperature: default_executor_temperature(),
            top_p: default_executor_top_p(),
            task_delay_ms: default_task_delay_ms(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load from the default path (~/.taskforge/config.toml).
    ///
    /// The environment can supply an API key when the file has none, in
    /// order: `TASKFORGE_API_KEY`, `OPENROUTER_API_KEY`, `OPENAI_API_KEY`.
    /// `TASKFORGE_PROVIDER` and `TASKFORGE_MODEL` override the file.
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = Self::config_dir();
        let config_path = config_dir.join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Env keys only fill a gap; they never shadow a configured key
        if config.api_key.is_none() {
            config.api_key = std::env::var("TASKFORGE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        // Provider/model env vars win over the file
        if let Ok(provider) = std::env::var("TASKFORGE_PROVIDER") {
            config.default_provider = provider;
        }
        if let Ok(model) = std::env::var("TASKFORGE_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// The directory holding config.toml.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskforge")
    }

    /// Range checks shared by both stages, plus task-bound sanity.
    fn validate(&self) -> Result<(), ConfigError> {
        for (stage, temperature, top_p, max_tokens) in [
            (
                "generator",
                self.generator.temperature,
                self.generator.top_p,
                self.generator.max_tokens,
            ),
            (
                "executor",
                self.executor.temperature,
                self.executor.top_p,
                self.executor.max_tokens,
            ),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "{stage}.temperature must be between 0.0 and 2.0"
                )));
            }
            if !(top_p > 0.0 && top_p <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{stage}.top_p must be in (0.0, 1.0]"
                )));
            }
            if max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{stage}.max_tokens must be greater than 0"
                )));
            }
        }

        if self.generator.min_tasks == 0 {
            return Err(ConfigError::ValidationError(
                "generator.min_tasks must be at least 1".into(),
            ));
        }
        if self.generator.min_tasks > self.generator.max_tasks {
            return Err(ConfigError::ValidationError(
                "generator.min_tasks must not exceed generator.max_tasks".into(),
            ));
        }

        Ok(())
    }

    /// Whether a global key made it in, from the file or the environment.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The default config rendered as TOML; `onboard` writes this to disk.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            generator: GeneratorConfig::default(),
            executor: ExecutorConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Home directory without pulling in the `dirs` crate.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.generator.min_tasks, 4);
        assert_eq!(config.generator.max_tasks, 7);
        assert_eq!(config.executor.task_delay_ms, 500);
    }

    #[test]
    fn stage_defaults_differ() {
        let config = AppConfig::default();
        assert_ne!(config.generator.max_tokens, config.executor.max_tokens);
        assert_ne!(config.generator.temperature, config.executor.temperature);
    }

    #[test]
    fn serialized_config_parses_back() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.executor.task_delay_ms, config.executor.task_delay_ms);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generator.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_top_p_rejected() {
        let mut config = AppConfig::default();
        config.executor.top_p = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_task_bounds_rejected() {
        let mut config = AppConfig::default();
        config.generator.min_tasks = 9;
        config.generator.max_tasks = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn default_toml_names_both_stages() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("[generator]"));
        assert!(toml_str.contains("task_delay_ms"));
    }

    #[test]
    fn stage_sections_parse_from_toml() {
        let toml_str = r#"
default_provider = "ollama"
default_model = "llama3.2"

[generator]
temperature = 0.9
max_tasks = 5

[executor]
max_tokens = 128
task_delay_ms = 0

[providers.ollama]
api_url = "http://localhost:11434/v1"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_provider, "ollama");
        assert!((config.generator.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.generator.max_tasks, 5);
        // Unset fields keep their defaults
        assert_eq!(config.generator.min_tasks, 4);
        assert_eq!(config.executor.max_tokens, 128);
        assert_eq!(config.executor.task_delay_ms, 0);
        assert_eq!(
            config.providers["ollama"].api_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn parse_error_reported_with_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "default_provider = [not toml").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret-value".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
