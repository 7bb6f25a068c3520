//! Audit log
//!
//! Append-only, versioned history of every write, backed by the durable
//! audit store. Rollback never edits history: it looks up a version here
//! and issues a new write.

use std::sync::Arc;

use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use unicfg_common::ConfigValue;
use unicfg_persistence::{
    AuditEntry, AuditFilter, AuditKind, AuditSource, AuditStore, DRIFT_REPORT_KEY, PriorValue,
    StoreError,
};

use crate::error::{ConfigError, Result};

/// Prefix of versions produced by `revert`
pub const ROLLBACK_PREFIX: &str = "rollback_";

/// Generate a fresh write version.
pub fn new_version() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S"), &id[..8])
}

/// Details of a committed write
#[derive(Clone, Debug)]
pub struct ChangeRecord<'a> {
    pub key: &'a str,
    pub old_value: PriorValue,
    pub new_value: &'a ConfigValue,
    pub version: &'a str,
    pub changed_by: &'a str,
    pub environment: &'a str,
}

pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append a change record. It is rollbackable only when the prior value
    /// is known exactly.
    pub async fn record_change(&self, change: ChangeRecord<'_>) -> Result<AuditEntry> {
        let rollbackable = matches!(change.old_value, PriorValue::Known(_));
        let entry = AuditEntry::builder(AuditKind::Change, change.key)
            .id(Uuid::new_v4().to_string())
            .old_value(change.old_value)
            .new_value(change.new_value.clone())
            .version(change.version)
            .source(AuditSource::Unified)
            .changed_by(change.changed_by)
            .rollbackable(rollbackable)
            .metadata("environment", change.environment.into())
            .build();
        self.append(entry.clone()).await?;
        Ok(entry)
    }

    pub async fn append(&self, entry: AuditEntry) -> Result<String> {
        self.store.append(entry).await.map_err(|e| {
            error!(error = %e, "failed to append audit entry");
            unavailable(e)
        })
    }

    /// The change entry written with `version`, if any
    pub async fn find_version(&self, version: &str) -> Result<Option<AuditEntry>> {
        let mut filter = AuditFilter::for_version(version);
        filter.kind = Some(AuditKind::Change);
        let found = self.store.query(&filter).await.map_err(unavailable)?;
        Ok(found.into_iter().next())
    }

    /// Every change to `key`, oldest first
    pub async fn history(&self, key: &str) -> Result<Vec<AuditEntry>> {
        let mut filter = AuditFilter::for_key(key);
        filter.kind = Some(AuditKind::Change);
        self.store.query(&filter).await.map_err(unavailable)
    }

    /// The newest `limit` drift reports, oldest first
    pub async fn drift_reports(&self, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        let filter = AuditFilter {
            key: Some(DRIFT_REPORT_KEY.to_string()),
            kind: Some(AuditKind::DriftReport),
            limit,
            ..Default::default()
        };
        self.store.query(&filter).await.map_err(unavailable)
    }

    /// Version for reverting `version`, suffixed when a previous revert of
    /// the same version already used the plain name.
    pub async fn rollback_version(&self, version: &str) -> Result<String> {
        let base = format!("{}{}", ROLLBACK_PREFIX, version);
        if self.find_version(&base).await?.is_none() {
            return Ok(base);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.find_version(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

fn unavailable(e: StoreError) -> ConfigError {
    ConfigError::AuditUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use unicfg_persistence::EmbeddedAuditStore;

    use super::*;

    fn change<'a>(key: &'a str, old: PriorValue, new: &'a ConfigValue, version: &'a str) -> ChangeRecord<'a> {
        ChangeRecord {
            key,
            old_value: old,
            new_value: new,
            version,
            changed_by: "tester",
            environment: "development",
        }
    }

    #[tokio::test]
    async fn test_record_change() {
        let log = AuditLog::new(Arc::new(EmbeddedAuditStore::new()));
        let v1 = ConfigValue::from(1);
        let v2 = ConfigValue::from(2);

        let first = log
            .record_change(change("a.b", PriorValue::Absent, &v1, "ver-1"))
            .await
            .unwrap();
        assert!(!first.rollbackable);
        assert!(!first.id.is_empty());

        let second = log
            .record_change(change("a.b", PriorValue::Known(v1.clone()), &v2, "ver-2"))
            .await
            .unwrap();
        assert!(second.rollbackable);
        assert_eq!(second.changed_by, "tester");
        assert_eq!(second.metadata["environment"], "development");

        let history = log.history("a.b").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].old_value, PriorValue::Known(v1));

        let found = log.find_version("ver-2").await.unwrap().unwrap();
        assert_eq!(found.id, second.id);
        assert!(log.find_version("ver-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rollback_version_is_unique() {
        let log = AuditLog::new(Arc::new(EmbeddedAuditStore::new()));
        let v = ConfigValue::from("x");
        assert_eq!(log.rollback_version("ver-1").await.unwrap(), "rollback_ver-1");

        log.record_change(change("a.b", PriorValue::Unknown, &v, "rollback_ver-1"))
            .await
            .unwrap();
        assert_eq!(log.rollback_version("ver-1").await.unwrap(), "rollback_ver-1-2");

        log.record_change(change("a.b", PriorValue::Unknown, &v, "rollback_ver-1-2"))
            .await
            .unwrap();
        assert_eq!(log.rollback_version("ver-1").await.unwrap(), "rollback_ver-1-3");
    }

    #[tokio::test]
    async fn test_store_outage_is_audit_unavailable() {
        let store = Arc::new(EmbeddedAuditStore::new());
        store.set_available(false);
        let log = AuditLog::new(store);
        let v = ConfigValue::from(1);
        assert!(matches!(
            log.record_change(change("a.b", PriorValue::Absent, &v, "ver-1")).await,
            Err(ConfigError::AuditUnavailable(_))
        ));
        assert!(matches!(
            log.history("a.b").await,
            Err(ConfigError::AuditUnavailable(_))
        ));
    }

    #[test]
    fn test_new_version_is_unique() {
        assert_ne!(new_version(), new_version());
    }
}
