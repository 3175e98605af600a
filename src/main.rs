//! cliptype: retype the clipboard as keystrokes
//!
//! Starts the global hotkey listener, then the worker and the console
//! application runtimes. Closing the console or a termination signal
//! sends EXIT to the application queue, which cancels every runtime.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cliptype::app::{self, ConsoleUi};
use cliptype::broker::{Broker, Message, APP_QUEUE, WORKER_QUEUE};
use cliptype::config::Config;
use cliptype::hotkey::HotkeyListener;
use cliptype::lifecycle::ShutdownSignal;
use cliptype::platform::{SystemClipboard, SystemKeyboard};
use cliptype::runtime::Registry;
use cliptype::worker::{self, Collaborators};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "cliptype starting");

    let config = Config::load()?;
    info!(?config.data_dir, "configuration loaded");

    let broker = Broker::new();
    let registry = Registry::new();
    let shutdown = ShutdownSignal::new();

    let listener = Arc::new(HotkeyListener::new());
    match listener.start() {
        Ok(()) => info!("hotkey listener started"),
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without hotkey support");
        }
    }

    let collaborators = Collaborators {
        hook: listener.clone(),
        clipboard: Arc::new(SystemClipboard),
        keyboard: Arc::new(SystemKeyboard),
    };
    let worker = worker::worker(WORKER_QUEUE, APP_QUEUE, config.worker()?, collaborators)
        .spawn(&broker, &registry)
        .context("failed to start worker")?;

    let ui = ConsoleUi::new().context("failed to open console")?;
    let app = app::application(
        APP_QUEUE,
        WORKER_QUEUE,
        Box::new(ui),
        config.labels()?,
        config.poll_interval(),
    )
    .spawn(&broker, &registry)
    .context("failed to start application")?;

    let mut app_join = tokio::task::spawn_blocking(move || app.join());

    tokio::select! {
        _ = &mut app_join => {
            info!("application closed");
        }
        _ = shutdown.wait() => {
            info!("shutdown signal received");
            broker.send(Message::exit(), APP_QUEUE);
            if app_join.await.is_err() {
                error!("application join task failed");
            }
        }
    }

    info!("shutting down...");

    listener.stop();
    let worker_join = tokio::task::spawn_blocking(move || worker.join()).await;
    if !matches!(worker_join, Ok(Ok(_))) {
        error!("worker runtime panicked");
    }

    if !registry.is_empty() {
        warn!(remaining = registry.len(), "runtimes still registered after shutdown");
    }

    info!("cliptype stopped");

    Ok(())
}
