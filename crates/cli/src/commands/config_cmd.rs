//! `studyhall config`: Configuration management commands.

use std::path::Path;

use studyhall_config::AppConfig;

use super::load_config;

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set STUDYHALL_API_KEY or OPENAI_API_KEY)");
            }
            if !config.cache.enabled {
                warnings.push("Response cache disabled; every reply calls the model");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Assistant:   {}", config.assistant.name);
            println!("   Model:       {}", config.completion.model);
            println!("   Endpoint:    {}", config.completion.base_url);
            println!("   Concurrency: {}", config.queue.concurrency);
            println!("   Attempts:    {}", config.queue.max_attempts);
            println!("   Cache TTL:   {}s", config.cache.ttl().as_secs());
        }
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e);
        }
    }

    Ok(())
}

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

pub fn init() {
    print!("{}", AppConfig::default_toml());
}
