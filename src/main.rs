#![deny(unused)]
//! VibeCraft - agent tooling for building in Minecraft.
//!
//! Connects to the client mod over WebSocket and exposes build, schematic
//! and world-inspection tools over HTTP.

use std::sync::Arc;

use vibecraft_bridge::ClientBridge;
use vibecraft_core::config::AppConfig;
use vibecraft_gateway::{GatewayConfig, GatewayServer};
use vibecraft_skills::{build_registry, SkillContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    vibecraft_governance::configure_tracing(config.logging.json)?;
    tracing::info!("Starting VibeCraft v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = vibecraft_governance::setup_metrics_recorder()?;

    // =========================================================================
    // Bridge to the client mod
    // =========================================================================
    let bridge = Arc::new(ClientBridge::from_config(&config));
    tracing::info!(endpoint = %bridge.endpoint(), "Client bridge configured");

    // The mod may not be running yet; requests reconnect on demand.
    match bridge.handshake().await {
        Ok(handshake) => tracing::info!(
            ok = handshake.ok,
            capabilities = %serde_json::to_string(&handshake.capabilities).unwrap_or_default(),
            "Bridge handshake complete"
        ),
        Err(e) => tracing::warn!(error = %e, "Bridge handshake failed; continuing"),
    }

    // =========================================================================
    // Tools and HTTP surface
    // =========================================================================
    let ctx = Arc::new(SkillContext::from_config(bridge.clone(), &config)?);
    let registry = build_registry(ctx);
    tracing::info!(tools = registry.len(), "Tool registry ready");

    let server = GatewayServer::new(GatewayConfig::from(&config.server), Arc::new(registry))
        .with_metrics(metrics_handle);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    bridge.close().await;
    tracing::info!("VibeCraft stopped");
    Ok(())
}
