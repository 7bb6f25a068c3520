//! Observability sink
//!
//! The orchestrator and the drift detector report through `ConfigMetrics`.
//! `PrometheusMetrics` keeps its collectors in a private registry so several
//! services (and tests) can live in one process.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use tracing::trace;

use unicfg_common::ConfigValue;
use unicfg_persistence::PriorValue;

/// Operation labels
pub mod op {
    pub const GET: &str = "get";
    pub const SET: &str = "set";
    pub const GET_ALL: &str = "get_all";
    pub const REFRESH: &str = "refresh";
    pub const REVERT: &str = "revert";
}

pub trait ConfigMetrics: Send + Sync {
    fn track_config_request(&self, key: &str, op: &str, latency: Duration, success: bool);

    fn track_cache_hit(&self, hit: bool, key: &str);

    fn track_drift_detection(&self, drifted_keys: &[String], total_checked: usize);

    fn track_config_change(
        &self,
        key: &str,
        old: &PriorValue,
        new: &ConfigValue,
        actor: &str,
        environment: &str,
    );

    /// A store could not be reached; `op` names the call that hit it.
    fn track_store_unavailable(&self, store: &str, op: &str);
}

/// Sink that drops everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl ConfigMetrics for NoopMetrics {
    fn track_config_request(&self, _key: &str, _op: &str, _latency: Duration, _success: bool) {}

    fn track_cache_hit(&self, _hit: bool, _key: &str) {}

    fn track_drift_detection(&self, _drifted_keys: &[String], _total_checked: usize) {}

    fn track_config_change(
        &self,
        _key: &str,
        _old: &PriorValue,
        _new: &ConfigValue,
        _actor: &str,
        _environment: &str,
    ) {
    }

    fn track_store_unavailable(&self, _store: &str, _op: &str) {}
}

/// Prometheus metrics collector
pub struct PrometheusMetrics {
    registry: Registry,

    /// Request latency histogram
    pub request_latency: HistogramVec,

    /// Requests by operation and status
    pub requests: IntCounterVec,

    /// Cache lookups by result
    pub cache_lookups: IntCounterVec,

    /// Keys drifted in the last detection cycle
    pub drifted_keys: Gauge,

    /// Drift detection cycles that found drift
    pub drift_reports: IntCounter,

    /// Committed changes by environment
    pub changes: CounterVec,

    /// Store availability incidents
    pub store_unavailable: IntCounterVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "unicfg_request_latency_seconds",
                "Config request latency in seconds",
            ),
            &["operation", "status"],
        )?;
        let requests = IntCounterVec::new(
            Opts::new("unicfg_requests_total", "Total config requests"),
            &["operation", "status"],
        )?;
        let cache_lookups = IntCounterVec::new(
            Opts::new("unicfg_cache_lookups_total", "Cache lookups by result"),
            &["result"],
        )?;
        let drifted_keys = Gauge::new(
            "unicfg_drifted_keys",
            "Keys found drifted in the last detection cycle",
        )?;
        let drift_reports = IntCounter::new(
            "unicfg_drift_reports_total",
            "Detection cycles that reported drift",
        )?;
        let changes = CounterVec::new(
            Opts::new("unicfg_changes_total", "Committed config changes"),
            &["environment"],
        )?;
        let store_unavailable = IntCounterVec::new(
            Opts::new(
                "unicfg_store_unavailable_total",
                "Store calls that failed as unavailable",
            ),
            &["store", "operation"],
        )?;

        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(drifted_keys.clone()))?;
        registry.register(Box::new(drift_reports.clone()))?;
        registry.register(Box::new(changes.clone()))?;
        registry.register(Box::new(store_unavailable.clone()))?;

        Ok(Self {
            registry,
            request_latency,
            requests,
            cache_lookups,
            drifted_keys,
            drift_reports,
            changes,
            store_unavailable,
        })
    }

    /// Get metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&self.registry.gather())
    }
}

impl ConfigMetrics for PrometheusMetrics {
    fn track_config_request(&self, key: &str, op: &str, latency: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        trace!(key, op, status, ?latency, "config request");
        self.request_latency
            .with_label_values(&[op, status])
            .observe(latency.as_secs_f64());
        self.requests.with_label_values(&[op, status]).inc();
    }

    fn track_cache_hit(&self, hit: bool, _key: &str) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    fn track_drift_detection(&self, drifted_keys: &[String], _total_checked: usize) {
        self.drifted_keys.set(drifted_keys.len() as f64);
        if !drifted_keys.is_empty() {
            self.drift_reports.inc();
        }
    }

    fn track_config_change(
        &self,
        _key: &str,
        _old: &PriorValue,
        _new: &ConfigValue,
        _actor: &str,
        environment: &str,
    ) {
        self.changes.with_label_values(&[environment]).inc();
    }

    fn track_store_unavailable(&self, store: &str, op: &str) {
        self.store_unavailable.with_label_values(&[store, op]).inc();
    }
}

/// Simple atomic counter shared between clones
#[derive(Clone, Debug, Default)]
pub struct SimpleCounter {
    value: Arc<AtomicU64>,
}

impl SimpleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_metrics() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.track_config_request("a.b", op::GET, Duration::from_millis(3), true);
        metrics.track_cache_hit(true, "a.b");
        metrics.track_cache_hit(false, "a.b");
        metrics.track_store_unavailable("primary", op::GET);
        metrics.track_drift_detection(&["a.b".to_string()], 4);
        metrics.track_config_change(
            "a.b",
            &PriorValue::Absent,
            &ConfigValue::from(1),
            "tester",
            "staging",
        );

        assert_eq!(metrics.requests.with_label_values(&["get", "success"]).get(), 1);
        assert_eq!(metrics.cache_lookups.with_label_values(&["hit"]).get(), 1);
        assert_eq!(metrics.drift_reports.get(), 1);
        assert_eq!(metrics.drifted_keys.get(), 1.0);

        let text = metrics.gather().unwrap();
        assert!(text.contains("unicfg_store_unavailable_total"));
        assert!(text.contains("unicfg_changes_total{environment=\"staging\"} 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = PrometheusMetrics::new().unwrap();
        let second = PrometheusMetrics::new().unwrap();
        first.track_store_unavailable("primary", op::SET);
        assert_eq!(
            second
                .store_unavailable
                .with_label_values(&["primary", "set"])
                .get(),
            0
        );
    }

    #[test]
    fn test_simple_counter() {
        let counter = SimpleCounter::new();
        let clone = counter.clone();
        counter.increment();
        clone.increment();
        assert_eq!(counter.get(), 2);
    }
}
