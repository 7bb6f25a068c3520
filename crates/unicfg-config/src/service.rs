//! Unified configuration service
//!
//! Reads resolve through cache, primary store, secondary store (client-only
//! keys), then schema default. Writes validate first, commit to the primary
//! store, invalidate the cache and then append an audit entry. Propagation
//! to the secondary store is best-effort background work.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use unicfg_common::{ConfigEntry, ConfigValue, ValueSource, encode, is_valid_key};
use unicfg_persistence::{
    AuditEntry, AuditStore, PrimaryBackend, PriorValue, SecondaryBackend, SecondaryPublisher,
};

use crate::audit::{AuditLog, ChangeRecord, new_version};
use crate::cache::{CacheStats, ConfigCache, Generation};
use crate::drift::{DriftDetector, DriftReport};
use crate::error::{ConfigError, Result};
use crate::metrics::{ConfigMetrics, NoopMetrics, SimpleCounter, op};
use crate::schema::SchemaRegistry;
use crate::settings::ServiceSettings;
use crate::store::{
    PRIMARY, PrimaryStoreAdapter, SECONDARY, SecondaryStoreAdapter, StoredEntry, with_timeout,
};
use crate::subscription::{ChangeCallback, Subscription};

/// Options for a single write
#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    /// Propagate to the secondary store even if the schema does not ask for it
    pub sync_to_secondary: bool,
    /// Explicit version; generated when unset
    pub version: Option<String>,
    pub changed_by: Option<String>,
}

impl SetOptions {
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            changed_by: Some(actor.into()),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_sync(mut self) -> Self {
        self.sync_to_secondary = true;
        self
    }
}

pub struct UnifiedConfigService {
    settings: ServiceSettings,
    schema: Arc<SchemaRegistry>,
    cache: ConfigCache,
    primary: Arc<PrimaryStoreAdapter>,
    secondary: Arc<SecondaryStoreAdapter>,
    publisher: Option<Arc<dyn SecondaryPublisher>>,
    audit: Arc<AuditLog>,
    drift: Arc<DriftDetector>,
    metrics: Arc<dyn ConfigMetrics>,
    store_unavailable: SimpleCounter,
}

impl UnifiedConfigService {
    pub fn builder(
        primary: Arc<dyn PrimaryBackend>,
        secondary: Arc<dyn SecondaryBackend>,
        audit: Arc<dyn AuditStore>,
    ) -> UnifiedConfigServiceBuilder {
        UnifiedConfigServiceBuilder {
            primary,
            secondary,
            audit,
            publisher: None,
            schema: SchemaRegistry::empty(),
            settings: ServiceSettings::default(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Resolve `key`, falling back to the schema default.
    ///
    /// Never fails: store outages are logged and counted, and an undefined
    /// result comes back as `None`.
    pub async fn get(&self, key: &str) -> Option<ConfigValue> {
        let start = Instant::now();
        let value = match self.lookup(key).await {
            Some(entry) => Some(entry.value),
            None => self.schema.default_for(key).cloned(),
        };
        self.metrics
            .track_config_request(key, op::GET, start.elapsed(), true);
        value
    }

    /// Resolve `key`, preferring the caller's default over the schema's.
    pub async fn get_or(&self, key: &str, default: impl Into<ConfigValue>) -> ConfigValue {
        let start = Instant::now();
        let value = match self.lookup(key).await {
            Some(entry) => entry.value,
            None => default.into(),
        };
        self.metrics
            .track_config_request(key, op::GET, start.elapsed(), true);
        value
    }

    /// The store-backed entry for `key`, without defaults
    pub async fn get_entry(&self, key: &str) -> Option<ConfigEntry> {
        self.lookup(key).await
    }

    async fn lookup(&self, key: &str) -> Option<ConfigEntry> {
        if !is_valid_key(key) {
            debug!(key, "ignoring read of invalid key");
            return None;
        }

        if let Some(entry) = self.cache.get(key) {
            self.metrics.track_cache_hit(true, key);
            return Some(entry);
        }
        self.metrics.track_cache_hit(false, key);
        let generation = self.cache.generation(key);

        match self.primary.read(key).await {
            Ok(stored) => return Some(self.cache_stored(key, stored, generation)),
            Err(ConfigError::NotFound(_)) => debug!(key, "not found in primary store"),
            Err(e) if e.is_unavailable() => {
                warn!(key, error = %e, "primary store unavailable on read");
                self.record_unavailable(PRIMARY, op::GET);
            }
            Err(e) => warn!(key, error = %e, "failed to read from primary store"),
        }

        if !self.schema.is_client_only(key) {
            return None;
        }

        match self.secondary.read(key).await {
            Ok(stored) => Some(self.cache_stored(key, stored, generation)),
            Err(ConfigError::NotFound(_)) => {
                debug!(key, "not found in secondary store");
                None
            }
            Err(e) => {
                if e.is_unavailable() {
                    self.record_unavailable(SECONDARY, op::GET);
                }
                warn!(key, error = %e, "failed to read from secondary store");
                None
            }
        }
    }

    fn cache_stored(&self, key: &str, stored: StoredEntry, seen: Generation) -> ConfigEntry {
        // secondary etags only identify a template, so revalidate by content
        let token = match stored.entry.source {
            ValueSource::Primary => stored.etag,
            ValueSource::Secondary => stored.entry.content_hash.clone(),
        };
        if !self
            .cache
            .put_if_current(key, stored.entry.clone(), token, seen)
        {
            debug!(key, "key changed during read, not caching");
        }
        stored.entry
    }

    /// Validate and write a value, returning the audit entry of the write.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<ConfigValue>,
        options: SetOptions,
    ) -> Result<AuditEntry> {
        let start = Instant::now();
        let result = self.write(key, value.into(), options).await;
        self.metrics
            .track_config_request(key, op::SET, start.elapsed(), result.is_ok());
        result
    }

    async fn write(&self, key: &str, value: ConfigValue, options: SetOptions) -> Result<AuditEntry> {
        self.schema.validate(key, &value)?;

        let (old_value, etag) = match self.primary.read(key).await {
            Ok(stored) => (PriorValue::Known(stored.entry.value), Some(stored.etag)),
            Err(ConfigError::NotFound(_)) => (PriorValue::Absent, None),
            Err(e) => {
                if e.is_unavailable() {
                    self.record_unavailable(PRIMARY, op::SET);
                }
                warn!(key, error = %e, "could not read prior value, recording it as unknown");
                (PriorValue::Unknown, None)
            }
        };

        let version = options.version.unwrap_or_else(new_version);
        let changed_by = options
            .changed_by
            .unwrap_or_else(|| self.settings.default_actor.clone());
        let sync = options.sync_to_secondary || self.schema.syncs_to_secondary(key);
        let entry = ConfigEntry::new(key, value, ValueSource::Primary, &version)
            .with_sync_to_secondary(sync);

        if let Err(e) = self.primary.write(&entry, etag.as_deref()).await {
            if e.is_unavailable() {
                self.record_unavailable(PRIMARY, op::SET);
            }
            warn!(key, version = %version, error = %e, "primary write failed");
            return Err(e);
        }

        if sync {
            self.propagate(&entry);
        }

        self.cache.invalidate(key);

        self.metrics.track_config_change(
            key,
            &old_value,
            &entry.value,
            &changed_by,
            &self.settings.environment,
        );
        let audit = self
            .audit
            .record_change(ChangeRecord {
                key,
                old_value,
                new_value: &entry.value,
                version: &version,
                changed_by: &changed_by,
                environment: &self.settings.environment,
            })
            .await?;

        info!(key, version = %version, changed_by = %changed_by, "config updated");
        Ok(audit)
    }

    /// Hand the entry to the secondary publisher in the background.
    fn propagate(&self, entry: &ConfigEntry) {
        let Some(publisher) = self.publisher.clone() else {
            warn!(key = %entry.key, "no secondary publisher configured, skipping propagation");
            return;
        };

        let key = entry.key.clone();
        let encoded = encode(&entry.value);
        let timeout = self.settings.store_timeout;
        let unavailable = self.store_unavailable.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let content_type = encoded.content_type.map(|ct| ct.as_str());
            match with_timeout(timeout, publisher.publish(&key, &encoded.wire, content_type)).await
            {
                Ok(()) => debug!(key = %key, "propagated to secondary store"),
                Err(e) => {
                    if e.is_unavailable() {
                        unavailable.increment();
                        metrics.track_store_unavailable(SECONDARY, op::SET);
                    }
                    warn!(key = %key, error = %e, "secondary propagation failed");
                }
            }
        });
    }

    /// Primary values under `prefix` plus schema defaults for missing keys.
    ///
    /// A primary outage degrades to defaults only.
    pub async fn get_all(&self, prefix: Option<&str>) -> BTreeMap<String, ConfigValue> {
        let start = Instant::now();
        let mut values = BTreeMap::new();

        match self.primary.list(prefix).await {
            Ok(entries) => {
                for stored in entries {
                    values.insert(stored.entry.key, stored.entry.value);
                }
            }
            Err(e) => {
                if e.is_unavailable() {
                    self.record_unavailable(PRIMARY, op::GET_ALL);
                }
                warn!(prefix = prefix.unwrap_or(""), error = %e, "primary list failed, using defaults");
            }
        }

        for (key, default) in self.schema.defaults(prefix) {
            values.entry(key).or_insert(default);
        }

        self.metrics.track_config_request(
            prefix.unwrap_or(""),
            op::GET_ALL,
            start.elapsed(),
            true,
        );
        values
    }

    /// Drop every cached value and run one drift cycle now.
    pub async fn refresh(&self) -> DriftReport {
        let start = Instant::now();
        self.cache.clear();
        info!("config cache cleared");
        let report = self.drift.run_cycle().await;
        self.metrics
            .track_config_request("", op::REFRESH, start.elapsed(), true);
        report
    }

    /// Poll `key` every subscribe interval and call `callback` on change.
    pub fn subscribe<F>(self: &Arc<Self>, key: &str, callback: F) -> Subscription
    where
        F: Fn(Option<ConfigValue>) + Send + Sync + 'static,
    {
        let service = Arc::clone(self);
        let poll_key = key.to_string();
        let callback: ChangeCallback = Box::new(callback);
        Subscription::start(
            key,
            self.settings.subscribe_interval,
            move || {
                let service = service.clone();
                let key = poll_key.clone();
                async move { service.get(&key).await }
            },
            callback,
        )
    }

    /// Undo the write recorded as `version` by writing its prior value back.
    pub async fn revert(&self, version: &str, changed_by: Option<&str>) -> Result<AuditEntry> {
        let start = Instant::now();
        let result = self.revert_version(version, changed_by).await;
        self.metrics
            .track_config_request(version, op::REVERT, start.elapsed(), result.is_ok());
        result
    }

    async fn revert_version(&self, version: &str, changed_by: Option<&str>) -> Result<AuditEntry> {
        let not_rollbackable = || ConfigError::NotRollbackable(version.to_string());

        let original = self
            .audit
            .find_version(version)
            .await?
            .ok_or_else(not_rollbackable)?;
        if !original.rollbackable {
            return Err(not_rollbackable());
        }
        let restored = original
            .old_value
            .known()
            .cloned()
            .ok_or_else(not_rollbackable)?;

        let options = SetOptions {
            sync_to_secondary: false,
            version: Some(self.audit.rollback_version(version).await?),
            changed_by: changed_by.map(str::to_string),
        };
        info!(key = %original.key, version, "reverting config");
        self.write(&original.key, restored, options).await
    }

    /// Every change to `key`, oldest first
    pub async fn history(&self, key: &str) -> Result<Vec<AuditEntry>> {
        self.audit.history(key).await
    }

    pub async fn drift_reports(&self, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        self.audit.drift_reports(limit).await
    }

    fn record_unavailable(&self, store: &str, op: &str) {
        self.store_unavailable.increment();
        self.metrics.track_store_unavailable(store, op);
    }

    /// Store calls that failed as unavailable since startup
    pub fn store_unavailable_count(&self) -> u64 {
        self.store_unavailable.get()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn drift_detector(&self) -> Arc<DriftDetector> {
        self.drift.clone()
    }
}

/// Builder for UnifiedConfigService
pub struct UnifiedConfigServiceBuilder {
    primary: Arc<dyn PrimaryBackend>,
    secondary: Arc<dyn SecondaryBackend>,
    audit: Arc<dyn AuditStore>,
    publisher: Option<Arc<dyn SecondaryPublisher>>,
    schema: SchemaRegistry,
    settings: ServiceSettings,
    metrics: Arc<dyn ConfigMetrics>,
}

impl UnifiedConfigServiceBuilder {
    pub fn schema(mut self, schema: SchemaRegistry) -> Self {
        self.schema = schema;
        self
    }

    pub fn settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn SecondaryPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn ConfigMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> UnifiedConfigService {
        let timeout = self.settings.store_timeout;
        let schema = Arc::new(self.schema);
        let primary = Arc::new(PrimaryStoreAdapter::new(self.primary, timeout));
        let secondary = Arc::new(SecondaryStoreAdapter::new(self.secondary, timeout));
        let audit = Arc::new(AuditLog::new(self.audit));
        let drift = Arc::new(DriftDetector::new(
            schema.clone(),
            primary.clone(),
            secondary.clone(),
            audit.clone(),
            self.metrics.clone(),
        ));

        UnifiedConfigService {
            cache: ConfigCache::new(self.settings.cache_ttl, self.settings.cache_max_capacity),
            settings: self.settings,
            schema,
            primary,
            secondary,
            publisher: self.publisher,
            audit,
            drift,
            metrics: self.metrics,
            store_unavailable: SimpleCounter::new(),
        }
    }
}
