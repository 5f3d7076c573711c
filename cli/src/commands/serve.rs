// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `protocollm serve` - run the HTTP API until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use protocollm_core::domain::engine_config::EngineConfigManifest;
use protocollm_core::presentation::api;

use crate::engine;

pub async fn run(manifest: EngineConfigManifest, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = &manifest.spec;
    info!("ProtocolLM engine '{}' starting", manifest.metadata.name);

    if let Some(metrics_port) = config.observability.as_ref().and_then(|o| o.metrics_port) {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], metrics_port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics on port {}", metrics_port);
    }

    let engine = engine::build(config).await?;
    for (provider, result) in engine.registry.health_check_all().await {
        match result {
            Ok(()) => info!(%provider, "Reasoning provider healthy"),
            Err(e) => warn!(%provider, "Reasoning provider health check failed: {}", e),
        }
    }

    let app = api::app(Arc::new(engine.app_state()));

    let host = host.unwrap_or_else(|| config.network.bind_address.clone());
    let port = port.unwrap_or(config.network.port);
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
