use crate::output::print_json;
use agonda_core::config::{Config, WarnLevel};
use agonda_core::workbench::RepoContext;
use anyhow::Context;
use clap::Subcommand;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective registry configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &RepoContext, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(ctx.root()).context("failed to load config")?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(&config, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    let reg = &config.registry;
    println!("Registry repo:    {}", reg.repo);
    println!("API URL:          {}", reg.api_url);
    println!("Primitives path:  {}", reg.primitives_path);
    println!("Page size:        {}", reg.page_size);
    println!("Timeout:          {}s", reg.timeout_secs);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();
    if errors > 0 {
        return Err(agonda_core::AgondaError::ValidationFailed { errors })
            .context("config validation found errors");
    }

    Ok(())
}
