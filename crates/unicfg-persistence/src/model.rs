//! Domain model types for the persistence layer
//!
//! These types are what the backend traits exchange, decoupled from the
//! decoded `ConfigValue` view the configuration core works with.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use unicfg_common::ConfigValue;

/// Partition key under which drift reports are appended to the audit store
pub const DRIFT_REPORT_KEY: &str = "$drift";

/// A raw value as held by a backend: wire string plus metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredValue {
    pub key: String,
    pub value: String,
    pub content_type: Option<String>,
    /// Entity tag for optimistic concurrency and cache revalidation
    pub etag: String,
    pub version: String,
    pub last_modified: DateTime<Utc>,
    pub sync_to_secondary: bool,
}

/// A write against the primary backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreWrite {
    pub key: String,
    pub value: String,
    pub content_type: Option<String>,
    pub version: String,
    pub sync_to_secondary: bool,
    /// When set, the write only succeeds if the stored etag still matches
    pub if_match: Option<String>,
}

/// Kind of an audit record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditKind {
    Change,
    DriftReport,
}

/// Which component produced an audit record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSource {
    Primary,
    Secondary,
    Unified,
}

/// The value a key held before a write
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum PriorValue {
    /// The key had no value
    Absent,
    /// The best-effort read before the write could not reach the store
    Unknown,
    Known(ConfigValue),
}

impl PriorValue {
    pub fn known(&self) -> Option<&ConfigValue> {
        match self {
            PriorValue::Known(v) => Some(v),
            _ => None,
        }
    }
}

/// Immutable audit record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub kind: AuditKind,
    pub key: String,
    pub old_value: PriorValue,
    pub new_value: Option<ConfigValue>,
    pub version: String,
    pub source: AuditSource,
    pub changed_by: String,
    pub timestamp: DateTime<Utc>,
    pub rollbackable: bool,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AuditEntry {
    /// Create a new audit entry builder
    pub fn builder(kind: AuditKind, key: impl Into<String>) -> AuditEntryBuilder {
        AuditEntryBuilder::new(kind, key)
    }
}

/// Builder for AuditEntry
pub struct AuditEntryBuilder {
    entry: AuditEntry,
}

impl AuditEntryBuilder {
    pub fn new(kind: AuditKind, key: impl Into<String>) -> Self {
        Self {
            entry: AuditEntry {
                id: String::new(),
                kind,
                key: key.into(),
                old_value: PriorValue::Absent,
                new_value: None,
                version: String::new(),
                source: AuditSource::Unified,
                changed_by: "system".to_string(),
                timestamp: Utc::now(),
                rollbackable: false,
                metadata: BTreeMap::new(),
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.entry.id = id.into();
        self
    }

    pub fn old_value(mut self, old: PriorValue) -> Self {
        self.entry.old_value = old;
        self
    }

    pub fn new_value(mut self, new: ConfigValue) -> Self {
        self.entry.new_value = Some(new);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.entry.version = version.into();
        self
    }

    pub fn source(mut self, source: AuditSource) -> Self {
        self.entry.source = source;
        self
    }

    pub fn changed_by(mut self, actor: impl Into<String>) -> Self {
        self.entry.changed_by = actor.into();
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.entry.timestamp = at;
        self
    }

    pub fn rollbackable(mut self, rollbackable: bool) -> Self {
        self.entry.rollbackable = rollbackable;
        self
    }

    pub fn metadata(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.entry.metadata.insert(name.into(), value);
        self
    }

    pub fn build(self) -> AuditEntry {
        self.entry
    }
}

/// Search criteria for audit records. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct AuditFilter {
    pub key: Option<String>,
    pub version: Option<String>,
    pub kind: Option<AuditKind>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn for_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn for_version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Default::default()
        }
    }

    pub fn of_kind(kind: AuditKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.key.as_ref().is_none_or(|k| &entry.key == k)
            && self.version.as_ref().is_none_or(|v| &entry.version == v)
            && self.kind.is_none_or(|k| entry.kind == k)
            && self.since.is_none_or(|t| entry.timestamp >= t)
            && self.until.is_none_or(|t| entry.timestamp <= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let entry = AuditEntry::builder(AuditKind::Change, "features.voice").build();
        assert_eq!(entry.key, "features.voice");
        assert_eq!(entry.old_value, PriorValue::Absent);
        assert_eq!(entry.source, AuditSource::Unified);
        assert_eq!(entry.changed_by, "system");
        assert!(!entry.rollbackable);
    }

    #[test]
    fn test_filter_matches() {
        let entry = AuditEntry::builder(AuditKind::Change, "a.b")
            .version("v1")
            .build();
        assert!(AuditFilter::default().matches(&entry));
        assert!(AuditFilter::for_key("a.b").matches(&entry));
        assert!(!AuditFilter::for_key("a.c").matches(&entry));
        assert!(AuditFilter::for_version("v1").matches(&entry));
        assert!(!AuditFilter::of_kind(AuditKind::DriftReport).matches(&entry));
    }

    #[test]
    fn test_prior_value_serialization() {
        let json = serde_json::to_string(&PriorValue::Known(ConfigValue::from(3))).unwrap();
        assert_eq!(json, r#"{"state":"known","value":3.0}"#);
        let json = serde_json::to_string(&PriorValue::Unknown).unwrap();
        assert_eq!(json, r#"{"state":"unknown"}"#);
    }
}
