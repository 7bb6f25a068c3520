//! Embedded secondary backend
//!
//! Models a client-distribution store with a published template and an
//! active template. Reads only ever see the active template; published
//! values become visible after `fetch_and_activate`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use unicfg_common::matches_prefix;

use super::FaultInjector;
use crate::error::{StoreError, StoreResult};
use crate::model::StoredValue;
use crate::traits::{SecondaryBackend, SecondaryPublisher};

pub struct EmbeddedSecondaryBackend {
    active: DashMap<String, StoredValue>,
    published: Mutex<BTreeMap<String, StoredValue>>,
    faults: FaultInjector,
    reads: AtomicUsize,
    publishes: AtomicUsize,
    activations: AtomicUsize,
}

impl EmbeddedSecondaryBackend {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
            published: Mutex::new(BTreeMap::new()),
            faults: FaultInjector::new(),
            reads: AtomicUsize::new(0),
            publishes: AtomicUsize::new(0),
            activations: AtomicUsize::new(0),
        }
    }

    /// Seed a value straight into the active template.
    pub fn insert(&self, key: &str, value: &str, content_type: Option<&str>) {
        self.active
            .insert(key.to_string(), stored(key, value, content_type));
    }

    pub fn remove(&self, key: &str) {
        self.active.remove(key);
    }

    /// Raw active value, bypassing counters and fault injection
    pub fn peek(&self, key: &str) -> Option<StoredValue> {
        self.active.get(key).map(|v| v.clone())
    }

    /// Number of published values waiting for activation
    pub fn pending_count(&self) -> usize {
        self.published.lock().len()
    }

    pub fn set_available(&self, available: bool) {
        self.faults.set_available(available);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.faults.set_latency(latency);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }

    pub fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }
}

impl Default for EmbeddedSecondaryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn stored(key: &str, value: &str, content_type: Option<&str>) -> StoredValue {
    let now = Utc::now();
    StoredValue {
        key: key.to_string(),
        value: value.to_string(),
        content_type: content_type.map(str::to_string),
        etag: format!("\"{}\"", now.timestamp_micros()),
        version: format!("template-{}", now.timestamp_millis()),
        last_modified: now,
        sync_to_secondary: true,
    }
}

#[async_trait]
impl SecondaryBackend for EmbeddedSecondaryBackend {
    async fn get(&self, key: &str) -> StoreResult<StoredValue> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.faults.check("secondary").await?;

        self.active
            .get(key)
            .map(|v| v.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<StoredValue>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.faults.check("secondary").await?;

        let mut values: Vec<StoredValue> = self
            .active
            .iter()
            .filter(|e| matches_prefix(e.key(), prefix))
            .map(|e| e.value().clone())
            .collect();
        values.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(values)
    }

    async fn fetch_and_activate(&self) -> StoreResult<bool> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        self.faults.check("secondary").await?;

        let pending = std::mem::take(&mut *self.published.lock());
        let changed = !pending.is_empty();
        for (key, value) in pending {
            self.active.insert(key, value);
        }
        if changed {
            debug!("activated new secondary template");
        }
        Ok(changed)
    }
}

#[async_trait]
impl SecondaryPublisher for EmbeddedSecondaryBackend {
    async fn publish(
        &self,
        key: &str,
        value: &str,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        self.faults.check("secondary").await?;

        self.published
            .lock()
            .insert(key.to_string(), stored(key, value, content_type));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_published_values_need_activation() {
        let backend = EmbeddedSecondaryBackend::new();
        backend.publish("features.voice", "true", None).await.unwrap();

        assert_eq!(backend.get("features.voice").await, Err(StoreError::NotFound));
        assert_eq!(backend.pending_count(), 1);

        assert!(backend.fetch_and_activate().await.unwrap());
        assert_eq!(backend.get("features.voice").await.unwrap().value, "true");
        assert_eq!(backend.pending_count(), 0);
        assert!(!backend.fetch_and_activate().await.unwrap());
    }

    #[tokio::test]
    async fn test_list_and_outage() {
        let backend = EmbeddedSecondaryBackend::new();
        backend.insert("features.a", "1", None);
        backend.insert("ui.theme", "dark", Some("text/plain"));
        assert_eq!(backend.list(Some("features.")).await.unwrap().len(), 1);

        backend.set_available(false);
        assert!(backend.get("ui.theme").await.unwrap_err().is_unavailable());
        assert!(
            backend
                .publish("ui.theme", "light", None)
                .await
                .unwrap_err()
                .is_unavailable()
        );
    }
}
