// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `protocollm inspect` - evaluate one request file in-process.
//!
//! The report is printed to stdout as JSON; progress goes to stderr.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use protocollm_core::domain::engine_config::EngineConfigManifest;
use protocollm_core::domain::events::EvaluationEvent;
use protocollm_core::domain::evidence::InspectRequest;
use protocollm_core::domain::verdict::InspectionStatus;

use crate::engine;

pub async fn run(manifest: EngineConfigManifest, file: PathBuf, account: String, summary: bool) -> Result<()> {
    let body = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read request file {:?}", file))?;
    let request: InspectRequest =
        serde_json::from_str(&body).with_context(|| format!("Invalid request JSON in {:?}", file))?;

    let engine = engine::build(&manifest.spec).await?;

    let mut events = engine.evaluation.event_bus().subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EvaluationEvent::EvaluationStarted { item_count, profile_id, .. } => {
                    eprintln!("Evaluating {} item(s) with profile {}", item_count, profile_id.bold());
                }
                EvaluationEvent::EvidenceAnalyzed { index, finding_count, .. } => {
                    eprintln!("  {} item {} ({} finding(s))", "✓".green(), index, finding_count);
                }
                EvaluationEvent::EvidenceFailed { index, reason, .. } => {
                    eprintln!("  {} item {}: {}", "✗".red(), index, reason);
                }
                EvaluationEvent::EvaluationCompleted { .. } | EvaluationEvent::EvaluationRejected { .. } => break,
                _ => {}
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = engine.evaluation.evaluate(&account, &request, &cancel).await;
    ctrl_c.abort();
    progress.abort();
    let report = result.context("Inspection failed")?;

    let status = match report.status {
        InspectionStatus::Pass => report.status.as_str().green(),
        InspectionStatus::Warning => report.status.as_str().yellow(),
        InspectionStatus::Fail => report.status.as_str().red(),
        InspectionStatus::InsufficientData => report.status.as_str().dimmed(),
    };
    eprintln!(
        "Status: {}  Risk: {}  Confidence: {:.2}  Credits: {} used, {} remaining",
        status.bold(),
        report.risk_level,
        report.confidence,
        report.metadata.credits_used,
        report.metadata.remaining_credits
    );

    println!("{}", serde_json::to_string_pretty(&report)?);

    if summary {
        match engine.evaluation.summarize(&report).await {
            Ok(text) => eprintln!("\n{}\n{}", "Summary:".bold(), text),
            Err(e) => warn!("Summary unavailable: {}", e),
        }
    }

    Ok(())
}
