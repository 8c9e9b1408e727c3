//! Taskforge CLI — the main entry point.
//!
//! Commands:
//! - `run`       — Break an objective into tasks and execute them
//! - `onboard`   — Initialize config
//! - `providers` — List supported LLM providers

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "taskforge",
    about = "Taskforge — turn one objective into prioritized tasks and execute them",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Break an objective into tasks and execute them in priority order
    Run {
        /// The objective to work toward
        objective: String,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,

        /// Use a specific provider instead of the configured default
        #[arg(short, long)]
        provider: Option<String>,

        /// Print the full execution log after the summary
        #[arg(long)]
        show_log: bool,
    },

    /// Initialize configuration
    Onboard,

    /// List supported LLM providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            objective,
            model,
            provider,
            show_log,
        } => commands::run::run(objective, model, provider, show_log).await?,
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Providers => commands::providers::run().await?,
    }

    Ok(())
}
