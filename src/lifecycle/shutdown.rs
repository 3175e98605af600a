//! Signal handling for graceful shutdown

use tracing::{debug, warn};

/// Handles shutdown signals (SIGTERM, SIGINT / Ctrl+C)
pub struct ShutdownSignal;

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self
    }

    /// Wait for a shutdown signal
    ///
    /// Never returns if no signal handler could be installed.
    pub async fn wait(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            debug!("received SIGTERM");
                        }
                        _ = Self::ctrl_c() => {}
                    }
                    return;
                }
                Err(e) => {
                    warn!(?e, "failed to register SIGTERM handler");
                }
            }
        }

        Self::ctrl_c().await;
    }

    async fn ctrl_c() {
        match tokio::signal::ctrl_c().await {
            Ok(()) => debug!("received SIGINT"),
            Err(e) => {
                warn!(?e, "failed to register SIGINT handler");
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
