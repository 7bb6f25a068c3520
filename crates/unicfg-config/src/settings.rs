//! Service settings
//!
//! Tunables the surrounding deployment may override. The host process loads
//! them from files and environment; the library only sees this struct.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CACHE_MAX_CAPACITY: u64 = 10_000;
pub const DEFAULT_DRIFT_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_SUBSCRIBE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_ACTOR: &str = "system";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub cache_ttl: Duration,
    pub cache_max_capacity: u64,
    pub drift_interval: Duration,
    pub subscribe_interval: Duration,
    /// Upper bound on every primary/secondary store call
    pub store_timeout: Duration,
    pub environment: String,
    /// Actor recorded on audit entries when the caller names none
    pub default_actor: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_max_capacity: DEFAULT_CACHE_MAX_CAPACITY,
            drift_interval: DEFAULT_DRIFT_INTERVAL,
            subscribe_interval: DEFAULT_SUBSCRIBE_INTERVAL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            default_actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

impl ServiceSettings {
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_max_capacity(mut self, capacity: u64) -> Self {
        self.cache_max_capacity = capacity;
        self
    }

    pub fn with_drift_interval(mut self, interval: Duration) -> Self {
        self.drift_interval = interval;
        self
    }

    pub fn with_subscribe_interval(mut self, interval: Duration) -> Self {
        self.subscribe_interval = interval;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_default_actor(mut self, actor: impl Into<String>) -> Self {
        self.default_actor = actor.into();
        self
    }
}
