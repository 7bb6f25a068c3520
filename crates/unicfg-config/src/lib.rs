//! Unicfg Config - Unified configuration service
//!
//! This crate reconciles configuration between an authoritative primary store
//! and a client-distribution secondary store:
//! - Schema registry and validation (`schema`)
//! - TTL cache of resolved values (`cache`)
//! - Store adapters with timeouts (`store`)
//! - Audit history and rollback (`audit`)
//! - Drift detection (`drift`)
//! - Polling subscriptions (`subscription`)
//! - The orchestrator (`service`) and its application context (`context`)

pub mod audit;
pub mod cache;
pub mod context;
pub mod drift;
pub mod error;
pub mod metrics;
pub mod schema;
pub mod service;
pub mod settings;
pub mod store;
pub mod subscription;

pub use audit::{AuditLog, ROLLBACK_PREFIX};
pub use cache::{CacheRecord, CacheStats, ConfigCache, Generation};
pub use context::{AppContext, ShutdownSignal};
pub use drift::{DriftDetector, DriftRecord, DriftReport};
pub use error::{ConfigError, Result};
pub use metrics::{ConfigMetrics, NoopMetrics, PrometheusMetrics};
pub use schema::{KeyRule, SchemaError, SchemaRegistry, ValidationError};
pub use service::{SetOptions, UnifiedConfigService, UnifiedConfigServiceBuilder};
pub use settings::ServiceSettings;
pub use subscription::Subscription;
