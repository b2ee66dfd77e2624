//! Shutdown signal handling for the monitor loop

use tokio::signal;
use tracing::{info, warn};

/// Wait for SIGTERM, SIGINT, or Ctrl+C
///
/// Only the supervisor reacts: supervised children run in their own process
/// group and do not receive terminal signals aimed at it.
pub async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            signal::ctrl_c().await.ok();
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, stopping monitor...");
        }
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, stopping monitor...");
        }
    }
}
