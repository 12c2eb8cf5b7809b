//! Harbor - IRC <-> Discord chat bridge
//!
//! Relays messages between mapped IRC and Discord channels, translating
//! formatting on the way and answering a small set of in-chat commands.

mod bridge;
mod command;
mod common;
mod config;
mod mutator;
mod pier;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{debug, error, info, warn};

use bridge::{Bridge, ChannelBundle, ChannelMap};
use config::{env::get_config_path, load_and_validate};
use pier::discord::DiscordPier;
use pier::irc::IrcPier;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Harbor v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  IRC: {}:{} as {}", config.irc.server, config.irc.port, config.irc.nickname);
    info!("  Channel mappings: {}", config.channels.len());
    info!("  Webhooks: {}", config.discord.webhooks.len());

    let channels = ChannelBundle::new();
    let shutdown_tx = channels.control.shutdown_tx;

    // ============================================================
    // Create piers
    // ============================================================
    let (discord, discord_client) =
        DiscordPier::connect(&config.discord, channels.piers.clone()).await?;

    let irc_channels = ChannelMap::from_config(&config.channels).irc_channels();
    let (irc, irc_connection) = IrcPier::new(config.irc.clone(), irc_channels, channels.piers);

    let bridge = Arc::new(Bridge::new(&config, irc, discord));
    info!("Bridge running as {}", bridge.bot_sender().display_name);

    // ============================================================
    // Run everything
    // ============================================================
    let mut discord_task = tokio::spawn(discord_client.run());
    let mut irc_task = tokio::spawn(irc_connection.run());
    let mut bridge_task = {
        let bridge = Arc::clone(&bridge);
        let bridge_channels = channels.bridge;
        tokio::spawn(async move { bridge.run(bridge_channels).await })
    };

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - closing connections...");
            true
        }
        _ = &mut discord_task => false,
        _ = &mut irc_task => false,
        _ = &mut bridge_task => false,
    };

    if !shutdown {
        warn!("A bridge task exited unexpectedly - shutting down");
    }

    // Fire-and-forget: tasks that already ended have dropped their receivers
    if let Err(e) = shutdown_tx.send(true) {
        debug!("Shutdown channel closed: {}", e);
    }

    let timeout = Duration::from_secs(5);
    let all_stopped = async {
        // The task that ended the select above has already been polled to completion
        for task in [bridge_task, irc_task, discord_task] {
            if !task.is_finished() {
                let _ = task.await;
            }
        }
    };
    match tokio::time::timeout(timeout, all_stopped).await {
        Ok(()) => info!("All connections closed"),
        Err(_) => warn!("Shutdown timed out"),
    }

    info!("Recorded {} relay latency samples", bridge.message_times().len());
    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
