//! Primary and secondary store adapters
//!
//! Thin glue between the backend clients and the orchestrator: every call is
//! bounded by the store timeout, wire values are decoded through the codec,
//! and backend errors become `ConfigError`s that keep `NotFound` distinct
//! from `StoreUnavailable`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use unicfg_common::{CodecError, ConfigEntry, ValueSource, decode, encode};
use unicfg_persistence::{
    PrimaryBackend, SecondaryBackend, StoreError, StoreResult, StoreWrite, StoredValue,
};

use crate::error::{ConfigError, Result};

pub const PRIMARY: &str = "primary";
pub const SECONDARY: &str = "secondary";

/// A decoded entry together with the backend's entity tag
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEntry {
    pub entry: ConfigEntry,
    pub etag: String,
}

/// Run a backend call, turning an elapsed deadline into `StoreError::Timeout`.
pub(crate) async fn with_timeout<T, F>(timeout: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(timeout)))
}

fn to_entry(
    stored: StoredValue,
    source: ValueSource,
) -> std::result::Result<StoredEntry, CodecError> {
    let value = decode(&stored.value, stored.content_type.as_deref())?;
    let entry = ConfigEntry::new(stored.key, value, source, stored.version)
        .with_sync_to_secondary(stored.sync_to_secondary)
        .with_last_modified(stored.last_modified);
    Ok(StoredEntry {
        entry,
        etag: stored.etag,
    })
}

fn decode_all(store: &str, values: Vec<StoredValue>, source: ValueSource) -> Vec<StoredEntry> {
    values
        .into_iter()
        .filter_map(|stored| {
            let key = stored.key.clone();
            to_entry(stored, source)
                .inspect_err(|e| warn!(store, key = %key, error = %e, "skipping undecodable value"))
                .ok()
        })
        .collect()
}

/// Adapter over the authoritative configuration backend
pub struct PrimaryStoreAdapter {
    backend: Arc<dyn PrimaryBackend>,
    timeout: Duration,
}

impl PrimaryStoreAdapter {
    pub fn new(backend: Arc<dyn PrimaryBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn read(&self, key: &str) -> Result<StoredEntry> {
        let stored = with_timeout(self.timeout, self.backend.get(key))
            .await
            .map_err(|e| ConfigError::from_store(PRIMARY, key, e))?;
        Ok(to_entry(stored, ValueSource::Primary)?)
    }

    /// Write an entry; with `if_match` the write only lands if the stored
    /// etag is unchanged. Returns the new etag.
    pub async fn write(&self, entry: &ConfigEntry, if_match: Option<&str>) -> Result<String> {
        let encoded = encode(&entry.value);
        let write = StoreWrite {
            key: entry.key.clone(),
            value: encoded.wire,
            content_type: encoded.content_type.map(|ct| ct.as_str().to_string()),
            version: entry.version.clone(),
            sync_to_secondary: entry.sync_to_secondary,
            if_match: if_match.map(str::to_string),
        };
        with_timeout(self.timeout, self.backend.put(write))
            .await
            .map_err(|e| ConfigError::from_store(PRIMARY, &entry.key, e))
    }

    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<StoredEntry>> {
        let values = with_timeout(self.timeout, self.backend.list(prefix))
            .await
            .map_err(|e| ConfigError::from_store(PRIMARY, prefix.unwrap_or(""), e))?;
        Ok(decode_all(PRIMARY, values, ValueSource::Primary))
    }
}

/// Read-only adapter over the client-distribution backend
pub struct SecondaryStoreAdapter {
    backend: Arc<dyn SecondaryBackend>,
    timeout: Duration,
}

impl SecondaryStoreAdapter {
    pub fn new(backend: Arc<dyn SecondaryBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn read(&self, key: &str) -> Result<StoredEntry> {
        let stored = with_timeout(self.timeout, self.backend.get(key))
            .await
            .map_err(|e| ConfigError::from_store(SECONDARY, key, e))?;
        Ok(to_entry(stored, ValueSource::Secondary)?)
    }

    /// Always fails: values reach the secondary store only through the
    /// distribution pipeline.
    pub async fn write(&self, _entry: &ConfigEntry) -> Result<()> {
        Err(ConfigError::ReadOnly(SECONDARY))
    }

    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<StoredEntry>> {
        let values = with_timeout(self.timeout, self.backend.list(prefix))
            .await
            .map_err(|e| ConfigError::from_store(SECONDARY, prefix.unwrap_or(""), e))?;
        Ok(decode_all(SECONDARY, values, ValueSource::Secondary))
    }

    /// Fetch and activate the latest published template.
    pub async fn activate(&self) -> Result<bool> {
        with_timeout(self.timeout, self.backend.fetch_and_activate())
            .await
            .map_err(|e| ConfigError::from_store(SECONDARY, "", e))
    }
}
