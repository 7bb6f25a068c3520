//! Cache layer
//!
//! Read-through, TTL-bounded cache of resolved entries. The orchestrator
//! populates it on a miss; the cache never fetches on its own. Expired
//! records read as a miss and are evicted by moka.
//!
//! Every invalidation bumps a generation. A reader captures the generation
//! before going to the store and fills with `put_if_current`, which drops the
//! record if the key was invalidated in between, so a slow read can never
//! resurrect a value a concurrent write already replaced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use moka::sync::Cache;
use parking_lot::RwLock;

use unicfg_common::ConfigEntry;

/// A cached entry and the token to revalidate it with
#[derive(Clone, Debug, PartialEq)]
pub struct CacheRecord {
    pub entry: ConfigEntry,
    pub cached_at: DateTime<Utc>,
    pub revalidation_token: String,
}

/// Hit/miss counters since the cache was created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Invalidation point observed before a store read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    key: u64,
}

pub struct ConfigCache {
    records: Cache<String, CacheRecord>,
    // bumped by clear(); writers hold it shared, clear() holds it exclusive
    epoch: RwLock<u64>,
    generations: DashMap<String, u64>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ConfigCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            records: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            epoch: RwLock::new(0),
            generations: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<ConfigEntry> {
        self.get_record(key).map(|r| r.entry)
    }

    /// Full record including the revalidation token
    pub fn get_record(&self, key: &str) -> Option<CacheRecord> {
        match self.records.get(key) {
            Some(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(record)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Current generation of `key`; capture it before reading the store.
    pub fn generation(&self, key: &str) -> Generation {
        let epoch = self.epoch.read();
        Generation {
            epoch: *epoch,
            key: self.generations.get(key).map(|g| *g).unwrap_or(0),
        }
    }

    pub fn put(&self, key: &str, entry: ConfigEntry, revalidation_token: impl Into<String>) {
        let _epoch = self.epoch.read();
        self.insert(key, entry, revalidation_token.into());
    }

    /// Insert unless `key` was invalidated or the cache cleared since `seen`.
    ///
    /// Returns whether the record was stored.
    pub fn put_if_current(
        &self,
        key: &str,
        entry: ConfigEntry,
        revalidation_token: impl Into<String>,
        seen: Generation,
    ) -> bool {
        let epoch = self.epoch.read();
        if *epoch != seen.epoch {
            return false;
        }
        // the shard lock is held until the insert lands
        let generation = self.generations.entry(key.to_owned()).or_insert(0);
        if *generation != seen.key {
            return false;
        }
        self.insert(key, entry, revalidation_token.into());
        true
    }

    fn insert(&self, key: &str, entry: ConfigEntry, revalidation_token: String) {
        self.records.insert(
            key.to_owned(),
            CacheRecord {
                entry,
                cached_at: Utc::now(),
                revalidation_token,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        let _epoch = self.epoch.read();
        let mut generation = self.generations.entry(key.to_owned()).or_insert(0);
        *generation += 1;
        self.records.invalidate(key);
    }

    pub fn clear(&self) {
        let mut epoch = self.epoch.write();
        *epoch += 1;
        self.records.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
