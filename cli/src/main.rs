// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # ProtocolLM CLI
//!
//! The `protocollm` binary runs the compliance evaluation engine either as an
//! HTTP service or as a one-shot command.
//!
//! ## Commands
//!
//! - `protocollm serve` - Run the HTTP API
//! - `protocollm inspect --file request.json --account ID` - Evaluate one request locally
//! - `protocollm packs list|show` - Browse the rule catalog
//! - `protocollm config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use protocollm_core::domain::engine_config::EngineConfigManifest;

mod commands;
mod engine;

use commands::{ConfigCommand, PacksCommand};

/// ProtocolLM - AI compliance evaluation engine
#[derive(Parser)]
#[command(name = "protocollm")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "PROTOCOLLM_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PROTOCOLLM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format (text, json)
    #[arg(long, global = true, env = "PROTOCOLLM_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Bind address (default: network.bind_address from config)
        #[arg(long, env = "PROTOCOLLM_HOST")]
        host: Option<String>,

        /// HTTP port (default: network.port from config)
        #[arg(long, env = "PROTOCOLLM_PORT")]
        port: Option<u16>,
    },

    /// Evaluate an inspection request file without a server
    Inspect {
        /// JSON request body, as accepted by POST /v1/inspect
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Account charged for the evaluation
        #[arg(short, long, env = "PROTOCOLLM_ACCOUNT")]
        account: String,

        /// Also ask the reasoning service for an executive summary
        #[arg(long)]
        summary: bool,
    },

    /// Browse protocol packs
    Packs {
        #[command(subcommand)]
        command: PacksCommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Commands::Config { command } = cli.command {
        init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
        return commands::config::handle_command(command, cli.config).await;
    }

    let manifest = EngineConfigManifest::load_or_default(cli.config.clone())
        .context("Failed to load configuration")?;
    let logging = manifest
        .spec
        .observability
        .as_ref()
        .and_then(|o| o.logging.clone());
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let format = cli
        .log_format
        .clone()
        .or_else(|| logging.map(|l| l.format))
        .unwrap_or_else(|| "text".to_string());
    init_logging(&level, &format)?;

    manifest.validate().context("Configuration validation failed")?;

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(manifest, host, port).await,
        Commands::Inspect {
            file,
            account,
            summary,
        } => commands::inspect::run(manifest, file, account, summary).await,
        Commands::Packs { command } => commands::packs::handle_command(command),
        Commands::Config { .. } => Ok(()),
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        _ => builder.with_target(false).compact().init(),
    }

    Ok(())
}
