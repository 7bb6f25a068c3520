//! Embedded in-memory backends
//!
//! Standalone implementations of every collaborator trait. They back the
//! server's embedded mode and double as spies in tests: each one counts the
//! calls it receives and can be switched into an outage or slowed down.

pub mod audit;
pub mod primary;
pub mod secondary;

pub use audit::EmbeddedAuditStore;
pub use primary::EmbeddedPrimaryBackend;
pub use secondary::EmbeddedSecondaryBackend;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Outage and latency switches shared by the embedded backends
pub(crate) struct FaultInjector {
    available: AtomicBool,
    latency_ms: AtomicU64,
}

impl FaultInjector {
    pub(crate) fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Apply the configured latency, then fail if the backend is "down".
    pub(crate) async fn check(&self, backend: &str) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("{} backend is down", backend)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fault_injector() {
        let faults = FaultInjector::new();
        assert!(faults.check("test").await.is_ok());

        faults.set_available(false);
        assert_eq!(
            faults.check("test").await,
            Err(StoreError::Unavailable("test backend is down".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_injector_latency() {
        let faults = FaultInjector::new();
        faults.set_latency(Duration::from_secs(3));

        let start = tokio::time::Instant::now();
        faults.check("test").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
