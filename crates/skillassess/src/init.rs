//! Interactive initialization for skillassess.
//!
//! Sets up the global config file with a user-selected provider.

use anyhow::Result;
use colored::Colorize;
use dialoguer::Select;
use std::fs;

use skillassess_agent::ProviderType;

use crate::config::global_config_path;

/// Provider info for display and config
struct ProviderInfo {
    display_name: &'static str,
    provider: ProviderType,
}

const PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        display_name: "Google Gemini",
        provider: ProviderType::Gemini,
    },
    ProviderInfo {
        display_name: "DeepSeek",
        provider: ProviderType::DeepSeek,
    },
];

/// Whether an API key for `provider` is present in the environment
pub fn has_api_key(provider: ProviderType) -> bool {
    provider
        .api_key_vars()
        .iter()
        .any(|var| std::env::var(var).is_ok_and(|v| !v.trim().is_empty()))
}

pub fn handle_init() -> Result<()> {
    eprintln!("{}", "Setting up skillassess...".bold());
    eprintln!();

    // Step 1: Report which providers have credentials
    eprintln!("{}", "Checking for API keys...".dimmed());
    for info in PROVIDERS {
        let vars = info.provider.api_key_vars().join(" or ");
        if has_api_key(info.provider) {
            eprintln!("  {} {} ({})", "✓".bright_green(), info.display_name, vars);
        } else {
            eprintln!("  {} {} ({} not set)", "✗".dimmed(), info.display_name, vars);
        }
    }
    eprintln!();

    // Step 2: Pick default provider, preferring one with a key
    let default = PROVIDERS
        .iter()
        .position(|info| has_api_key(info.provider))
        .unwrap_or(0);
    let items: Vec<&str> = PROVIDERS.iter().map(|p| p.display_name).collect();
    let selection = Select::new()
        .with_prompt("Select your default provider")
        .items(&items)
        .default(default)
        .interact()?;
    let provider = PROVIDERS[selection].provider;

    // Step 3: Write global config
    let config_path = global_config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir)?;
    }

    if config_path.exists() {
        eprintln!(
            "{} Config already exists at {}",
            "⚠".bright_yellow(),
            config_path.display()
        );

        let overwrite = Select::new()
            .with_prompt("Overwrite existing config?")
            .items(&["No, keep existing", "Yes, replace it"])
            .default(0)
            .interact()?;

        if overwrite == 0 {
            eprintln!();
            eprintln!("Keeping existing config. Edit it manually if needed:");
            eprintln!("  {}", config_path.display().to_string().dimmed());
            return Ok(());
        }
    }

    fs::write(&config_path, render_config(provider))?;

    eprintln!();
    eprintln!(
        "{} Config saved to {}",
        "✓".bright_green(),
        config_path.display()
    );

    if !has_api_key(provider) {
        eprintln!(
            "{} Set {} (or add it to a .env file) before generating.",
            "⚠".bright_yellow(),
            provider.api_key_vars()[0].bright_cyan()
        );
    }

    print_getting_started();
    Ok(())
}

/// Config file contents for a freshly chosen provider
fn render_config(provider: ProviderType) -> String {
    format!(
        r#"provider = "{provider}"
model = "{model}"
# output_dir = "grids"

[retry]
max_transport_retries = 3
max_repair_retries = 2
base_delay = "1s"
max_delay = "30s"
timeout = "2m"

[pipeline]
regeneration_budget = 1

[throttle]
max_concurrent = 2
# min_interval = "500ms"

# Override per-role:
# [generator]
# temperature = 0.7

# [critic]
# model = ""
# temperature = 0.3
"#,
        provider = provider,
        model = provider.default_model()
    )
}

fn print_getting_started() {
    eprintln!();
    eprintln!("{}", "Getting started:".bold());
    eprintln!(
        "  {} Run: {}",
        "1.".dimmed(),
        "skillassess generate --competency \"...\" --level ... --track ... --duration 2h"
            .bright_cyan()
    );
    eprintln!(
        "  {} Or list several competencies in a file: {}",
        "2.".dimmed(),
        "skillassess batch competencies.toml".bright_cyan()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    #[test]
    fn test_rendered_config_parses_back() {
        for info in PROVIDERS {
            let config: ProjectConfig = toml::from_str(&render_config(info.provider)).unwrap();
            assert_eq!(config.provider().unwrap(), Some(info.provider));
            assert_eq!(config.generator_model(), Some(info.provider.default_model()));
            assert_eq!(config.pipeline.regeneration_budget, Some(1));
        }
    }
}
