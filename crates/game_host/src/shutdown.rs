//! Graceful shutdown handling
//!
//! Listens for termination signals so that an operator stopping the process
//! goes through the same session teardown as a timeout would.

use std::io;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Set up a shutdown signal handler
///
/// # Platform Support
/// * Unix/Linux: Handles SIGINT (Ctrl+C) and SIGTERM signals
/// * Windows: Handles Ctrl+C events
///
/// # Returns
/// * `oneshot::Receiver<()>` - Receiver that will be triggered on shutdown signal
///
/// If the handlers cannot be installed the error is logged and the receiver
/// never fires.
pub fn setup_shutdown_handler() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                info!("{} received - initiating graceful shutdown", signal);
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to install shutdown signal handlers: {}", e);
                // Holding the sender keeps the receiver pending.
                std::future::pending::<()>().await;
                drop(tx);
            }
        }
    });

    rx
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(windows)]
async fn wait_for_signal() -> io::Result<&'static str> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
    ctrl_c.recv().await;
    Ok("Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_shutdown_handler_creation() {
        let shutdown_rx = setup_shutdown_handler();

        // Should not be ready since no signal was sent
        let result = timeout(Duration::from_millis(10), shutdown_rx).await;
        assert!(result.is_err());
    }
}
