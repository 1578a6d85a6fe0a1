//! nowplaying-daemon: mirrors the currently playing track into a chat
//! account's profile status
//!
//! This daemon provides:
//! - HTTP ingestion endpoint for track updates from the music client
//! - Status state machine with live and suspended modes, debounced updates
//! - Operator console for enabling/disabling live mode
//!
//! The live/suspended flag is persisted so a restart never shows a track
//! the operator had suspended.

mod config;
mod console;
mod events;
mod ingest;
mod lifecycle;
mod profile;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::console::{CommandBridge, ConsoleListener};
use crate::events::StatusEvent;
use crate::ingest::{ManagerSlot, Server};
use crate::lifecycle::ShutdownSignal;
use crate::profile::{DryRunUpdater, HttpProfileUpdater, ProfileUpdater};
use crate::state::{FlagStore, StatusManager};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "nowplaying-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.state_file, port = config.port, "configuration loaded");

    let shutdown = ShutdownSignal::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Status manager -> event logger
    let (event_tx, mut event_rx) = broadcast::channel::<StatusEvent>(64);

    // Bind before restoring so early clients get a clear "not initialized"
    let slot = ManagerSlot::new();
    let server = Server::bind(config.bind_addr, &config.candidate_ports(), slot.clone()).await?;
    info!(addr = %server.local_addr()?, "ingestion endpoint ready");
    let mut server_task = tokio::spawn(server.run(shutdown_tx.subscribe()));

    let updater: Arc<dyn ProfileUpdater> = match &config.profile_url {
        Some(url) => {
            let updater = HttpProfileUpdater::new(url.clone(), config.profile_timeout)
                .context("failed to build profile client")?;
            info!(endpoint = %updater.endpoint(), "profile updates go to bridge endpoint");
            Arc::new(updater)
        }
        None => {
            warn!("NOWPLAYING_PROFILE_URL not set, running in dry-run mode");
            Arc::new(DryRunUpdater)
        }
    };

    let manager = Arc::new(
        StatusManager::restore(
            config.status.clone(),
            FlagStore::new(&config.state_file),
            updater,
            event_tx,
        )
        .await,
    );
    slot.install(Arc::clone(&manager));
    info!(live = manager.is_live(), "status manager installed");

    // Operator console -> command bridge
    let (command_tx, command_rx) = mpsc::channel(32);
    let console = ConsoleListener::new(command_tx);
    match console.start() {
        Ok(()) => info!("operator console started"),
        Err(e) => warn!(error = %e, "continuing without operator console"),
    }

    let bridge = CommandBridge::new(Arc::clone(&manager));
    tokio::spawn(async move { bridge.run(command_rx).await });

    info!("daemon initialized, entering main loop");

    let mut server_finished = false;

    tokio::select! {
        result = &mut server_task => {
            server_finished = true;
            match result {
                Ok(Ok(())) => info!("ingestion server exited"),
                Ok(Err(e)) => error!(error = %e, "ingestion server error"),
                Err(e) => error!(error = %e, "ingestion server task failed"),
            }
        }

        // Log status events
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event @ StatusEvent::UpdateFailed { .. }) => {
                        warn!(%event, "status event received");
                    }
                    Ok(event) => {
                        info!(%event, "status event received");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("status event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    console.stop();
    if console.is_running() {
        // detached thread, it does not hold up process exit
        debug!("console reader still waiting for input, leaving it behind");
    }
    let _ = shutdown_tx.send(());
    if !server_finished {
        match server_task.await {
            Ok(Err(e)) => error!(error = %e, "ingestion server error during shutdown"),
            Err(e) => error!(error = %e, "ingestion server task failed"),
            Ok(Ok(())) => {}
        }
    }

    info!("nowplaying-daemon stopped");

    Ok(())
}
