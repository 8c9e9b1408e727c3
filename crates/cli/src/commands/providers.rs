//! `taskforge providers` — List the generation backends taskforge can drive.

/// (provider, endpoint, auth) — endpoints shown without scheme to keep the
/// table narrow. The keyless entries must stay in sync with the router's
/// `requires_api_key`.
const ROWS: &[(&str, &str, &str)] = &[
    ("openrouter", "openrouter.ai/api/v1", "API key"),
    ("openai", "api.openai.com/v1", "API key"),
    ("ollama", "localhost:11434/v1", "none (local)"),
    ("deepseek", "api.deepseek.com/v1", "API key"),
    ("groq", "api.groq.com/openai/v1", "API key"),
    ("together", "api.together.xyz/v1", "API key"),
    ("fireworks", "api.fireworks.ai/inference/v1", "API key"),
    ("vllm", "localhost:8000/v1", "none (local)"),
    ("llamacpp", "localhost:8080/v1", "none (local)"),
];

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🤖 Generation Backends");
    println!("======================\n");

    println!("  ┌────────────┬───────────────────────────────┬──────────────┐");
    println!("  │ {:10} │ {:29} │ {:12} │", "Provider", "Endpoint", "Auth");
    println!("  ├────────────┼───────────────────────────────┼──────────────┤");
    for (name, endpoint, auth) in ROWS {
        println!("  │ {name:10} │ {endpoint:29} │ {auth:12} │");
    }
    println!("  └────────────┴───────────────────────────────┴──────────────┘");

    println!();
    println!("  Custom endpoints:");
    println!("    Point any provider at an OpenAI-compatible server in config.toml:");
    println!();
    println!("      default_provider = \"openai\"");
    println!("      [providers.openai]");
    println!("      api_url = \"https://your-custom-endpoint.com/v1\"");
    println!("      api_key = \"your-key\"");

    println!();
    println!("  Environment overrides:");
    println!("    TASKFORGE_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY");
    println!("    TASKFORGE_PROVIDER, TASKFORGE_MODEL");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ROWS;
    use taskforge_providers::requires_api_key;

    #[test]
    fn every_row_fits_the_table() {
        for (name, endpoint, auth) in ROWS {
            assert!(name.len() <= 10, "{name} overflows the provider column");
            assert!(endpoint.len() <= 29, "{endpoint} overflows the endpoint column");
            assert!(auth.len() <= 12, "{auth} overflows the auth column");
        }
    }

    #[test]
    fn keyless_rows_match_router_policy() {
        for (name, _, auth) in ROWS {
            assert_eq!(
                auth.starts_with("none"),
                !requires_api_key(name),
                "table disagrees with requires_api_key for {name}"
            );
        }
    }
}
