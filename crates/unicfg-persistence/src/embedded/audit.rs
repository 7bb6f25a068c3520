//! Embedded audit store

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::FaultInjector;
use crate::error::StoreResult;
use crate::model::{AuditEntry, AuditFilter};
use crate::traits::AuditStore;

/// Append-only in-memory audit store, partitioned by key.
///
/// Every record keeps the global sequence number it was appended with, so
/// records sharing a timestamp still come back in append order.
pub struct EmbeddedAuditStore {
    partitions: DashMap<String, Vec<(u64, AuditEntry)>>,
    sequence: AtomicU64,
    faults: FaultInjector,
}

impl EmbeddedAuditStore {
    pub fn new() -> Self {
        Self {
            partitions: DashMap::new(),
            sequence: AtomicU64::new(0),
            faults: FaultInjector::new(),
        }
    }

    /// Total number of records across all partitions
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_available(&self, available: bool) {
        self.faults.set_available(available);
    }
}

impl Default for EmbeddedAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for EmbeddedAuditStore {
    async fn append(&self, mut entry: AuditEntry) -> StoreResult<String> {
        self.faults.check("audit").await?;

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if entry.id.is_empty() {
            entry.id = format!("audit-{}", seq);
        }
        let id = entry.id.clone();
        self.partitions
            .entry(entry.key.clone())
            .or_default()
            .push((seq, entry));
        Ok(id)
    }

    async fn query(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditEntry>> {
        self.faults.check("audit").await?;

        let mut matched: Vec<(u64, AuditEntry)> = match &filter.key {
            Some(key) => self
                .partitions
                .get(key)
                .map(|p| {
                    p.iter()
                        .filter(|(_, e)| filter.matches(e))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            None => self
                .partitions
                .iter()
                .flat_map(|p| {
                    p.value()
                        .iter()
                        .filter(|(_, e)| filter.matches(e))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .collect(),
        };

        matched.sort_by(|(sa, a), (sb, b)| a.timestamp.cmp(&b.timestamp).then(sa.cmp(sb)));

        // keep the newest `limit` records
        if let Some(limit) = filter.limit
            && matched.len() > limit
        {
            matched.drain(..matched.len() - limit);
        }

        Ok(matched.into_iter().map(|(_, e)| e).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditKind, DRIFT_REPORT_KEY};

    fn change(key: &str, version: &str) -> AuditEntry {
        AuditEntry::builder(AuditKind::Change, key)
            .version(version)
            .build()
    }

    #[tokio::test]
    async fn test_append_assigns_ids() {
        let store = EmbeddedAuditStore::new();
        let id = store.append(change("a", "v1")).await.unwrap();
        assert_eq!(id, "audit-1");

        let explicit = AuditEntry::builder(AuditKind::Change, "a")
            .id("custom")
            .build();
        assert_eq!(store.append(explicit).await.unwrap(), "custom");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_query_by_key_keeps_append_order() {
        let store = EmbeddedAuditStore::new();
        let at = chrono::Utc::now();
        for v in ["v1", "v2", "v3"] {
            let entry = AuditEntry::builder(AuditKind::Change, "k")
                .version(v)
                .timestamp(at)
                .build();
            store.append(entry).await.unwrap();
        }
        store.append(change("other", "v4")).await.unwrap();

        let versions: Vec<String> = store
            .query(&AuditFilter::for_key("k"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(versions, vec!["v1", "v2", "v3"]);
    }

    #[tokio::test]
    async fn test_query_filters_and_limit() {
        let store = EmbeddedAuditStore::new();
        store.append(change("a", "v1")).await.unwrap();
        store.append(change("b", "v2")).await.unwrap();
        store
            .append(AuditEntry::builder(AuditKind::DriftReport, DRIFT_REPORT_KEY).build())
            .await
            .unwrap();

        let found = store.query(&AuditFilter::for_version("v2")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "b");

        let drift = store
            .query(&AuditFilter::of_kind(AuditKind::DriftReport))
            .await
            .unwrap();
        assert_eq!(drift.len(), 1);

        let newest = store
            .query(&AuditFilter {
                limit: Some(1),
                kind: Some(AuditKind::Change),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].version, "v2");
    }

    #[tokio::test]
    async fn test_outage_rejects_append() {
        let store = EmbeddedAuditStore::new();
        store.set_available(false);
        assert!(store.append(change("a", "v1")).await.is_err());
        assert!(store.is_empty());
    }
}
