//! Application context
//!
//! Built once at process start and passed by handle to every call site.
//! Owns the service and the lifecycle of its background drift timer.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::service::UnifiedConfigService;

/// Shutdown signal sender and receiver
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Get a receiver for shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AppContext {
    service: Arc<UnifiedConfigService>,
    shutdown: ShutdownSignal,
    drift_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppContext {
    pub fn new(service: UnifiedConfigService) -> Self {
        Self {
            service: Arc::new(service),
            shutdown: ShutdownSignal::new(),
            drift_task: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &Arc<UnifiedConfigService> {
        &self.service
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Start the drift timer. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut task = self.drift_task.lock();
        if task.is_some() {
            warn!("application context already started");
            return;
        }
        let interval = self.service.settings().drift_interval;
        *task = Some(
            self.service
                .drift_detector()
                .spawn(interval, self.shutdown.subscribe()),
        );
        info!(
            environment = %self.service.settings().environment,
            "configuration service started"
        );
    }

    pub fn is_running(&self) -> bool {
        self.drift_task.lock().is_some()
    }

    /// Stop the drift timer and wait for it to finish.
    pub async fn shutdown(&self) {
        self.shutdown.shutdown();
        let task = self.drift_task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "drift detector task ended abnormally");
        }
        info!("configuration service stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use unicfg_common::ValueType;
    use unicfg_persistence::{EmbeddedAuditStore, EmbeddedPrimaryBackend, EmbeddedSecondaryBackend};

    use super::*;
    use crate::schema::{KeyRule, SchemaRegistry};
    use crate::settings::ServiceSettings;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let signal = ShutdownSignal::new();
        let mut rx = signal.subscribe();
        signal.shutdown();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let secondary = Arc::new(EmbeddedSecondaryBackend::new());
        let schema = SchemaRegistry::builder()
            .rule("ui.theme", KeyRule::new(ValueType::String).sync_to_secondary())
            .build()
            .unwrap();
        let service = UnifiedConfigService::builder(
            Arc::new(EmbeddedPrimaryBackend::new()),
            secondary.clone(),
            Arc::new(EmbeddedAuditStore::new()),
        )
        .schema(schema)
        .settings(ServiceSettings::default().with_drift_interval(Duration::from_secs(60)))
        .build();

        let ctx = AppContext::new(service);
        ctx.start();
        ctx.start();
        assert!(ctx.is_running());

        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(secondary.activation_count(), 2);

        ctx.shutdown().await;
        assert!(!ctx.is_running());
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(secondary.activation_count(), 2);
    }
}
