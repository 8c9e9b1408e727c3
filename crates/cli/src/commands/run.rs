//! `taskforge run` — Drive one objective through the full pipeline.
//!
//! Wires config, provider, and orchestrator together, prints progress as
//! events arrive, then prints the prioritized tasks with their results.

use std::sync::Arc;
use std::time::Duration;

use taskforge_config::AppConfig;
use taskforge_core::event::{EventBus, PipelineEvent};
use taskforge_core::generation::{GenerationOptions, TextGenerator};
use taskforge_core::run::{LogLevel, Run, RunState};
use taskforge_core::task::TaskPriority;
use taskforge_engine::Orchestrator;
use taskforge_providers::{OpenAiCompatGenerator, default_base_url, requires_api_key};
use tracing::debug;

pub async fn run(
    objective: String,
    model: Option<String>,
    provider: Option<String>,
    show_log: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let objective = objective.trim().to_string();
    if objective.is_empty() {
        return Err("The objective must not be empty.".into());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider_name = provider.unwrap_or_else(|| config.default_provider.clone());

    // Fail fast on a missing key, with setup guidance
    if requires_api_key(&provider_name) && resolve_api_key(&config, &provider_name).is_none() {
        eprintln!();
        eprintln!("  ERROR: no API key for provider '{provider_name}'");
        eprintln!();
        eprintln!("  Set one of:");
        eprintln!("    $env:OPENROUTER_API_KEY = 'sk-or-v1-...'   (one key, many models)");
        eprintln!("    $env:OPENAI_API_KEY     = 'sk-...'");
        eprintln!("    $env:TASKFORGE_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!(
            "  Or put it in {} (run `taskforge onboard` to create one).",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        eprintln!("  OpenRouter keys: https://openrouter.ai/keys");
        eprintln!("  Keyless local backends: taskforge run \"...\" --provider ollama");
        eprintln!();
        return Err(format!("No API key found for provider '{provider_name}'.").into());
    }

    let model = resolve_model(&config, &provider_name, model.as_deref());

    let router = taskforge_providers::build_from_config(&config);
    let backend: Arc<dyn TextGenerator> = match router.get(&provider_name) {
        Some(backend) => backend,
        None => {
            // --provider named a backend with no config section; materialize
            // it from the built-in defaults, as the router does for its own
            // default backend.
            let api_key = config.api_key.clone().unwrap_or_else(|| {
                if requires_api_key(&provider_name) {
                    String::new()
                } else {
                    provider_name.clone()
                }
            });
            Arc::new(OpenAiCompatGenerator::new(
                &provider_name,
                &default_base_url(&provider_name),
                &api_key,
            ))
        }
    };
    debug!(provider = %provider_name, model = %model, "Backend resolved");

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Taskforge — Objective Pipeline        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {provider_name}");
    println!("  Model:      {model}");
    println!("  Objective:  {objective}");
    println!();

    // Subscribe before the run starts so no event is missed. The printer
    // ends when the orchestrator (the only sender) is dropped.
    let event_bus = Arc::new(EventBus::default());
    let mut events = event_bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(event.as_ref());
        }
    });

    let orchestrator = Orchestrator::new(backend, &model, event_bus)
        .with_generator_options(GenerationOptions {
            max_tokens: config.generator.max_tokens,
            temperature: config.generator.temperature,
            top_p: config.generator.top_p,
        })
        .with_executor_options(GenerationOptions {
            max_tokens: config.executor.max_tokens,
            temperature: config.executor.temperature,
            top_p: config.executor.top_p,
        })
        .with_task_bounds(config.generator.min_tasks, config.generator.max_tasks)
        .with_task_delay(Duration::from_millis(config.executor.task_delay_ms));

    let run = orchestrator.process_objective(&objective).await?;

    drop(orchestrator);
    let _ = printer.await;

    if run.state == RunState::Failed {
        let reason = run.error.clone().unwrap_or_else(|| "Run failed".into());
        eprintln!();
        eprintln!("  ❌ {reason}");
        if show_log {
            print_log(&run);
        }
        return Err(reason.into());
    }

    print_summary(&run);
    if show_log {
        print_log(&run);
    }

    Ok(())
}

/// Model resolution order: `--model` flag, then the provider's own
/// `default_model`, then the global default.
fn resolve_model(config: &AppConfig, provider: &str, flag: Option<&str>) -> String {
    if let Some(model) = flag {
        return model.to_string();
    }
    if let Some(model) = config
        .providers
        .get(provider)
        .and_then(|p| p.default_model.clone())
    {
        return model;
    }
    config.default_model.clone()
}

/// The key that would be sent for this provider: its own section's key,
/// falling back to the global one.
fn resolve_api_key(config: &AppConfig, provider: &str) -> Option<String> {
    config
        .providers
        .get(provider)
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::TasksGenerated { count, source, .. } => {
            if source == "structured" {
                println!("  ● Generated {count} tasks");
            } else {
                println!("  ● Generated {count} tasks (fallback: {source})");
            }
            println!();
        }
        PipelineEvent::TaskStarted { name, .. } => {
            println!("  ▶ {name}");
        }
        PipelineEvent::TaskCompleted {
            fell_back,
            duration_ms,
            ..
        } => {
            if *fell_back {
                println!("    ⚠️  backend call failed, placeholder recorded ({duration_ms} ms)");
            } else {
                println!("    ✅ done ({duration_ms} ms)");
            }
        }
        _ => {}
    }
}

fn print_summary(run: &Run) {
    println!();
    println!(
        "  Results — {}/{} tasks completed",
        run.completed_count(),
        run.tasks.len()
    );
    println!("  ──────────────────────────────────────────────");
    for task in &run.tasks {
        println!("  [{}] {}", priority_label(task.priority), task.name);
        if let Some(result) = &task.result {
            for line in result.lines() {
                println!("      {line}");
            }
        }
        println!();
    }
    if let Some(error) = &run.error {
        println!("  ⚠️  {error}");
        println!();
    }
}

fn print_log(run: &Run) {
    println!();
    println!("  Execution log");
    println!("  ─────────────");
    for entry in &run.log {
        let time = entry
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S");
        println!("  [{time}] [{:7}] {}", level_label(entry.level), entry.message);
    }
    println!();
}

fn priority_label(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Critical => "CRIT",
        TaskPriority::High => "HIGH",
        TaskPriority::Medium => "MED ",
        TaskPriority::Low => "LOW ",
    }
}

fn level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Success => "SUCCESS",
        LogLevel::Warning => "WARNING",
        LogLevel::Error => "ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_config::ProviderConfig;

    fn config_with_provider_model(model: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.providers.insert(
            "groq".into(),
            ProviderConfig {
                api_key: Some("sk-groq".into()),
                api_url: None,
                default_model: model.map(String::from),
            },
        );
        config
    }

    #[test]
    fn model_flag_wins() {
        let config = config_with_provider_model(Some("llama-3.3-70b"));
        assert_eq!(
            resolve_model(&config, "groq", Some("mixtral-8x7b")),
            "mixtral-8x7b"
        );
    }

    #[test]
    fn provider_default_model_beats_global_default() {
        let config = config_with_provider_model(Some("llama-3.3-70b"));
        assert_eq!(resolve_model(&config, "groq", None), "llama-3.3-70b");
    }

    #[test]
    fn global_default_model_is_the_last_resort() {
        let config = config_with_provider_model(None);
        assert_eq!(resolve_model(&config, "groq", None), config.default_model);
    }

    #[test]
    fn provider_key_beats_global_key() {
        let mut config = config_with_provider_model(None);
        config.api_key = Some("sk-global".into());
        assert_eq!(resolve_api_key(&config, "groq").as_deref(), Some("sk-groq"));
        assert_eq!(
            resolve_api_key(&config, "openrouter").as_deref(),
            Some("sk-global")
        );
    }

    #[test]
    fn missing_key_resolves_to_none() {
        let config = AppConfig::default();
        assert!(resolve_api_key(&config, "openrouter").is_none());
    }

    #[test]
    fn priority_labels_are_fixed_width() {
        for priority in [
            TaskPriority::Low,
            TaskPriority::Medium,
            TaskPriority::High,
            TaskPriority::Critical,
        ] {
            assert_eq!(priority_label(priority).len(), 4);
        }
    }
}
