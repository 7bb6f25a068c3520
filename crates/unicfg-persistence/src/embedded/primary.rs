//! Embedded primary backend

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use unicfg_common::matches_prefix;

use super::FaultInjector;
use crate::error::{StoreError, StoreResult};
use crate::model::{StoreWrite, StoredValue};
use crate::traits::PrimaryBackend;

/// In-memory authoritative store with per-key entity tags
pub struct EmbeddedPrimaryBackend {
    data: DashMap<String, StoredValue>,
    revision: AtomicU64,
    faults: FaultInjector,
    reads: AtomicUsize,
    writes: AtomicUsize,
    lists: AtomicUsize,
}

impl EmbeddedPrimaryBackend {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            revision: AtomicU64::new(0),
            faults: FaultInjector::new(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
        }
    }

    /// Seed a raw value directly, bypassing counters and fault injection.
    pub fn insert(&self, key: &str, value: &str, content_type: Option<&str>) -> String {
        let etag = self.next_etag();
        self.data.insert(
            key.to_string(),
            StoredValue {
                key: key.to_string(),
                value: value.to_string(),
                content_type: content_type.map(str::to_string),
                etag: etag.clone(),
                version: format!("seed-{}", etag.trim_matches('"')),
                last_modified: Utc::now(),
                sync_to_secondary: false,
            },
        );
        etag
    }

    /// Raw stored value, bypassing counters and fault injection
    pub fn peek(&self, key: &str) -> Option<StoredValue> {
        self.data.get(key).map(|v| v.clone())
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

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    fn next_etag(&self) -> String {
        let rev = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        format!("\"{}\"", rev)
    }
}

impl Default for EmbeddedPrimaryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrimaryBackend for EmbeddedPrimaryBackend {
    async fn get(&self, key: &str) -> StoreResult<StoredValue> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.faults.check("primary").await?;

        self.data
            .get(key)
            .map(|v| v.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn put(&self, write: StoreWrite) -> StoreResult<String> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.faults.check("primary").await?;

        let etag = self.next_etag();
        let stored = StoredValue {
            key: write.key.clone(),
            value: write.value,
            content_type: write.content_type,
            etag: etag.clone(),
            version: write.version,
            last_modified: Utc::now(),
            sync_to_secondary: write.sync_to_secondary,
        };

        match self.data.entry(write.key) {
            Entry::Occupied(mut occupied) => {
                if let Some(expected) = write.if_match
                    && occupied.get().etag != expected
                {
                    return Err(StoreError::Conflict {
                        expected,
                        actual: occupied.get().etag.clone(),
                    });
                }
                occupied.insert(stored);
            }
            Entry::Vacant(vacant) => {
                if let Some(expected) = write.if_match {
                    return Err(StoreError::Conflict {
                        expected,
                        actual: String::new(),
                    });
                }
                vacant.insert(stored);
            }
        }

        debug!(etag = %etag, "primary write committed");
        Ok(etag)
    }

    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<StoredValue>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.faults.check("primary").await?;

        let mut values: Vec<StoredValue> = self
            .data
            .iter()
            .filter(|e| matches_prefix(e.key(), prefix))
            .map(|e| e.value().clone())
            .collect();
        values.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(key: &str, value: &str, if_match: Option<String>) -> StoreWrite {
        StoreWrite {
            key: key.to_string(),
            value: value.to_string(),
            content_type: None,
            version: "v".to_string(),
            sync_to_secondary: false,
            if_match,
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let backend = EmbeddedPrimaryBackend::new();
        assert_eq!(backend.get("a.b").await, Err(StoreError::NotFound));
        assert_eq!(backend.read_count(), 1);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let backend = EmbeddedPrimaryBackend::new();
        let etag = backend.put(write("a.b", "1", None)).await.unwrap();

        let stored = backend.get("a.b").await.unwrap();
        assert_eq!(stored.value, "1");
        assert_eq!(stored.etag, etag);
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_put_if_match() {
        let backend = EmbeddedPrimaryBackend::new();
        let first = backend.put(write("a.b", "1", None)).await.unwrap();
        let second = backend
            .put(write("a.b", "2", Some(first.clone())))
            .await
            .unwrap();
        assert_ne!(first, second);

        // stale tag loses
        let err = backend
            .put(write("a.b", "3", Some(first.clone())))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                expected: first,
                actual: second
            }
        );
        assert_eq!(backend.peek("a.b").unwrap().value, "2");
    }

    #[tokio::test]
    async fn test_list_prefix_sorted() {
        let backend = EmbeddedPrimaryBackend::new();
        backend.insert("features.b", "true", None);
        backend.insert("features.a", "false", None);
        backend.insert("quotas.x", "3", None);

        let keys: Vec<String> = backend
            .list(Some("features."))
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.key)
            .collect();
        assert_eq!(keys, vec!["features.a", "features.b"]);
        assert_eq!(backend.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_outage() {
        let backend = EmbeddedPrimaryBackend::new();
        backend.insert("a.b", "1", None);
        backend.set_available(false);

        assert!(backend.get("a.b").await.unwrap_err().is_unavailable());
        assert!(
            backend
                .put(write("a.b", "2", None))
                .await
                .unwrap_err()
                .is_unavailable()
        );
        assert_eq!(backend.peek("a.b").unwrap().value, "1");
    }
}
