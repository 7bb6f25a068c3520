//! Drift detection between the primary and secondary stores
//!
//! Every key whose rule sets `sync_to_secondary` is read from both stores and
//! compared by content hash. A cycle that finds drift writes exactly one
//! drift-report audit entry, however many keys drifted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use unicfg_common::ConfigValue;
use unicfg_persistence::{AuditEntry, AuditKind, AuditSource, DRIFT_REPORT_KEY};

use crate::audit::{AuditLog, new_version};
use crate::error::{ConfigError, Result};
use crate::metrics::ConfigMetrics;
use crate::schema::SchemaRegistry;
use crate::store::{PrimaryStoreAdapter, SecondaryStoreAdapter, StoredEntry};

/// Actor recorded on drift-report audit entries
pub const DRIFT_ACTOR: &str = "drift-detector";

/// Comparison result for one key in one cycle
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftRecord {
    pub key: String,
    pub primary_value: Option<ConfigValue>,
    pub secondary_value: Option<ConfigValue>,
    pub primary_hash: Option<String>,
    pub secondary_hash: Option<String>,
    pub drifted: bool,
    pub last_checked: DateTime<Utc>,
}

/// Outcome of one detection cycle
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DriftReport {
    /// Keys that could be compared, drifted or not
    pub records: Vec<DriftRecord>,
    pub drifted_keys: Vec<String>,
    /// Keys skipped because a store read failed
    pub undetermined_keys: Vec<String>,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        !self.drifted_keys.is_empty()
    }

    /// Number of keys actually compared
    pub fn checked(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, key: &str) -> Option<&DriftRecord> {
        self.records.iter().find(|r| r.key == key)
    }
}

pub struct DriftDetector {
    schema: Arc<SchemaRegistry>,
    primary: Arc<PrimaryStoreAdapter>,
    secondary: Arc<SecondaryStoreAdapter>,
    audit: Arc<AuditLog>,
    metrics: Arc<dyn ConfigMetrics>,
}

impl DriftDetector {
    pub fn new(
        schema: Arc<SchemaRegistry>,
        primary: Arc<PrimaryStoreAdapter>,
        secondary: Arc<SecondaryStoreAdapter>,
        audit: Arc<AuditLog>,
        metrics: Arc<dyn ConfigMetrics>,
    ) -> Self {
        Self {
            schema,
            primary,
            secondary,
            audit,
            metrics,
        }
    }

    /// Compare one key across both stores.
    ///
    /// Absence on a side is a valid state; any other read failure leaves
    /// the key undetermined.
    pub async fn check_key(&self, key: &str) -> Result<DriftRecord> {
        let (primary, secondary) = tokio::join!(self.primary.read(key), self.secondary.read(key));
        let primary = present(primary)?;
        let secondary = present(secondary)?;

        let primary_hash = primary.as_ref().map(|s| s.entry.content_hash.clone());
        let secondary_hash = secondary.as_ref().map(|s| s.entry.content_hash.clone());
        Ok(DriftRecord {
            key: key.to_string(),
            drifted: primary_hash != secondary_hash,
            primary_value: primary.map(|s| s.entry.value),
            secondary_value: secondary.map(|s| s.entry.value),
            primary_hash,
            secondary_hash,
            last_checked: Utc::now(),
        })
    }

    /// Run one detection cycle over every sync key.
    pub async fn run_cycle(&self) -> DriftReport {
        if let Err(e) = self.secondary.activate().await {
            warn!(error = %e, "secondary activation failed, comparing against current template");
        }

        let keys = self.schema.sync_keys();
        let results = join_all(keys.iter().map(|key| self.check_key(key))).await;

        let mut report = DriftReport::default();
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(record) => {
                    if record.drifted {
                        report.drifted_keys.push(key);
                    }
                    report.records.push(record);
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "drift undetermined");
                    report.undetermined_keys.push(key);
                }
            }
        }

        // every cycle, so the drifted-keys gauge clears once drift resolves
        self.metrics
            .track_drift_detection(&report.drifted_keys, report.checked());

        if report.has_drift() {
            warn!(
                drifted = report.drifted_keys.len(),
                undetermined = report.undetermined_keys.len(),
                checked = report.checked(),
                "configuration drift detected"
            );
            // the report is still returned when the audit store is down
            let _ = self.audit.append(report_entry(&report)).await;
        } else {
            debug!(
                checked = report.checked(),
                undetermined = report.undetermined_keys.len(),
                "no drift detected"
            );
        }

        report
    }

    /// Run a cycle every `interval` until `shutdown` fires.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        info!(?interval, keys = self.schema.sync_keys().len(), "starting drift detector");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("drift detector shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                }
            }
        })
    }
}

fn present(result: Result<StoredEntry>) -> Result<Option<StoredEntry>> {
    match result {
        Ok(stored) => Ok(Some(stored)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn report_entry(report: &DriftReport) -> AuditEntry {
    let drifted: Vec<&DriftRecord> = report.records.iter().filter(|r| r.drifted).collect();
    AuditEntry::builder(AuditKind::DriftReport, DRIFT_REPORT_KEY)
        .version(format!("drift-{}", new_version()))
        .source(AuditSource::Unified)
        .changed_by(DRIFT_ACTOR)
        .rollbackable(false)
        .metadata("driftedKeys", serde_json::json!(report.drifted_keys))
        .metadata("undeterminedKeys", serde_json::json!(report.undetermined_keys))
        .metadata("totalChecked", serde_json::json!(report.checked()))
        .metadata(
            "records",
            serde_json::to_value(drifted).unwrap_or(serde_json::Value::Null),
        )
        .build()
}
