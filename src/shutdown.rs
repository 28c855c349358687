//! Graceful shutdown trigger for the server.

use std::future::Future;

use tracing::{error, info};

/// Resolve once `signal` fires. If the handler can't be installed the
/// error is logged and this never resolves, so the other triggers still
/// decide when to stop.
pub async fn wait_for<F>(name: &str, signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Received {} signal", name),
        Err(e) => {
            error!("Failed to install {} handler: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}

/// Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = wait_for("Ctrl+C", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = wait_for("SIGTERM", async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        sig.recv().await;
        Ok(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
