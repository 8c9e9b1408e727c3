//! `taskforge onboard` — First-time setup.

use taskforge_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("📋 Taskforge — First-Time Setup");
    println!("===============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created {}", config_dir.display());
    } else {
        println!("  Config directory already present: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Found an existing config at: {}", config_path.display());
        println!("   Leaving it untouched — edit it directly, or delete it and re-run onboard.\n");
    } else {
        let default_toml = AppConfig::default_toml();
        std::fs::write(&config_path, &default_toml)?;
        println!("✅ Wrote a starter config.toml to: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Add your API key to {}", config_path.display());
        println!("   2. Run: taskforge run \"Plan a weekend hiking trip\"");
        println!("   3. Watch the tasks get generated, prioritized, and executed!\n");
    }

    println!("🎉 Setup complete! Run `taskforge run \"<objective>\"` to start.\n");

    Ok(())
}
