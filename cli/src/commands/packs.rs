// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Protocol pack browsing
//!
//! Commands: list, show

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use protocollm_core::domain::catalog::{RuleCatalog, Severity};

#[derive(Subcommand)]
pub enum PacksCommand {
    /// List active protocol packs
    List,

    /// Show one pack and its standards
    Show {
        /// Pack id, e.g. food_service_nationwide_v1
        id: String,

        /// Print the pack as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn handle_command(command: PacksCommand) -> Result<()> {
    let catalog = RuleCatalog::builtin();
    match command {
        PacksCommand::List => list(&catalog),
        PacksCommand::Show { id, json } => show(&catalog, &id, json),
    }
}

fn list(catalog: &RuleCatalog) -> Result<()> {
    for pack in catalog.active_packs() {
        let legacy = match &pack.maps_to {
            Some(target) => format!(" (legacy, maps to {})", target).dimmed().to_string(),
            None => String::new(),
        };
        println!(
            "{}  {} v{}  [{} standards]{}",
            pack.id.bold(),
            pack.name,
            pack.version,
            catalog.effective_standards(&pack.id).len(),
            legacy
        );
    }
    Ok(())
}

fn show(catalog: &RuleCatalog, id: &str, as_json: bool) -> Result<()> {
    let pack = catalog
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("Protocol pack '{}' not found", id))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(pack)?);
        return Ok(());
    }

    println!("{} ({})", pack.name.bold(), pack.id);
    println!("  Version: {}", pack.version);
    println!("  Sector: {}", pack.sector);
    if let Some(coverage) = &pack.coverage {
        println!("  Coverage: {}", coverage);
    }
    println!("  {}", pack.description);
    println!();

    let constraints = &pack.constraints;
    if let Some(max) = constraints.cold_holding_max_f {
        println!("  Cold holding: ≤ {}°F", max);
    }
    if let Some(min) = constraints.hot_holding_min_f {
        println!("  Hot holding: ≥ {}°F", min);
    }
    if let Some(frequency) = &constraints.inspection_frequency {
        println!("  Inspection frequency: {}", frequency);
    }

    println!();
    println!("{}", "Standards:".bold());
    for standard in catalog.effective_standards(id) {
        let severity = match standard.severity {
            Severity::Critical => standard.severity.as_str().red(),
            Severity::High => standard.severity.as_str().yellow(),
            _ => standard.severity.as_str().normal(),
        };
        println!("  {:<12} {:<8} {}", standard.code, severity, standard.title);
    }

    Ok(())
}
