//! Graceful shutdown handling

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use unicfg_config::{AppContext, ShutdownSignal};

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Wait for Ctrl+C or SIGTERM, then fire `signal`.
pub fn spawn_signal_listener(signal: ShutdownSignal) {
    tokio::spawn(async move {
        tokio::select! {
            _ = ctrl_c() => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate() => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }
        signal.shutdown();
    });
}

/// Block until `receiver` fires, then stop the context within `timeout`.
pub async fn run_until_shutdown(
    context: &AppContext,
    mut receiver: broadcast::Receiver<()>,
    timeout: Duration,
) {
    let _ = receiver.recv().await;

    info!(?timeout, "Shutdown initiated");
    if tokio::time::timeout(timeout, context.shutdown()).await.is_err() {
        warn!("background tasks did not stop within {:?}", timeout);
    }
    info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use unicfg_config::UnifiedConfigService;
    use unicfg_persistence::{EmbeddedAuditStore, EmbeddedPrimaryBackend, EmbeddedSecondaryBackend};

    use super::*;

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let service = UnifiedConfigService::builder(
            Arc::new(EmbeddedPrimaryBackend::new()),
            Arc::new(EmbeddedSecondaryBackend::new()),
            Arc::new(EmbeddedAuditStore::new()),
        )
        .build();
        let context = Arc::new(AppContext::new(service));
        context.start();

        let waiter = context.clone();
        let receiver = context.shutdown_signal().subscribe();
        let handle = tokio::spawn(async move {
            run_until_shutdown(&waiter, receiver, Duration::from_secs(5)).await
        });

        context.shutdown_signal().shutdown();
        handle.await.unwrap();
        assert!(!context.is_running());
    }
}
