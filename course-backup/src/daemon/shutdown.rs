//! SIGTERM / SIGINT handling for the scheduled mode.
//!
//! A signal stops new runs from being scheduled. A run that is already in
//! progress is left to finish.

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Notify every subscriber. Returns `false` when nobody was listening.
    pub fn trigger(&self) -> bool {
        match self.shutdown_tx.send(()) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to broadcast shutdown signal: {}", e);
                false
            }
        }
    }

    /// Wait for SIGINT or SIGTERM, then notify subscribers.
    pub async fn wait_for_signal(&self) -> bool {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
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
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), stopping the scheduler...");
            }
            _ = terminate => {
                info!("Received SIGTERM, stopping the scheduler...");
            }
        }

        self.trigger()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
