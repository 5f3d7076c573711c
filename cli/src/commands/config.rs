// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use protocollm_core::domain::engine_config::EngineConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./protocollm-config.yaml)
        #[arg(short, long, default_value = "./protocollm-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let manifest = EngineConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;
    let config = &manifest.spec;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. PROTOCOLLM_CONFIG_PATH: {}",
            std::env::var("PROTOCOLLM_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./protocollm-config.yaml");
        println!("  4. ~/.protocollm/config.yaml");
        println!("  5. /etc/protocollm/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Engine: {}", manifest.metadata.name);
    println!();

    println!("{}", "Reasoning Providers:".bold());
    if config.reasoning_providers.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    for provider in &config.reasoning_providers {
        let state = if provider.enabled { "" } else { " [disabled]" };
        println!("  {} ({}){}", provider.name.bold(), provider.provider_type, state);
        println!("    Endpoint: {}", provider.endpoint);
        for model in &provider.models {
            println!("      - {} → {}", model.alias, model.model);
        }
    }
    println!();

    let selection = &config.reasoning_selection;
    println!("{}", "Reasoning Selection:".bold());
    println!("  Default model: {}", selection.default_model);
    if let Some(fallback) = &selection.fallback_provider {
        println!("  Fallback provider: {}", fallback);
    }
    println!("  Retries: {} (base delay {}ms)", selection.max_retries, selection.retry_delay_ms);
    println!();

    let dispatch = &config.dispatch;
    println!("{}", "Dispatch:".bold());
    println!("  Item timeout: {:?}", dispatch.item_timeout);
    println!("  Max concurrency: {}", dispatch.max_concurrency);
    println!("  Max items per request: {}", dispatch.max_items);
    println!("  Text chunk size: {} chars", dispatch.text_chunk_size);
    println!();

    println!("{}", "Storage:".bold());
    match &config.ledger.database_url {
        Some(_) => println!("  Credit ledger: PostgreSQL"),
        None => println!(
            "  Credit ledger: in-memory ({} seeded account(s))",
            config.ledger.seed_balances.len()
        ),
    }
    match &config.evidence_store {
        Some(store) => println!("  Evidence store: {}", store.path),
        None => println!("  Evidence store: {}", "(disabled)".dimmed()),
    }
    match &config.retrieval.endpoint {
        Some(endpoint) => println!("  Retrieval: {} (top_k {})", endpoint, config.retrieval.top_k),
        None => println!("  Retrieval: {}", "(disabled)".dimmed()),
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let manifest = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    manifest.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_templates_are_valid() {
        for sample in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let manifest = EngineConfigManifest::from_yaml_str(sample).unwrap();
            manifest.validate().unwrap();
        }
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("protocollm-config.yaml");
        generate(output.clone(), false).unwrap();
        assert!(EngineConfigManifest::from_yaml_file(&output).is_ok());
    }
}
