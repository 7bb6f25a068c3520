//! Service construction
//!
//! The host runs over the embedded stores; the secondary backend doubles as
//! the publisher so propagated values show up after the next activation.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use unicfg_config::{AppContext, PrometheusMetrics, SchemaRegistry, UnifiedConfigService};
use unicfg_persistence::{EmbeddedAuditStore, EmbeddedPrimaryBackend, EmbeddedSecondaryBackend};

use crate::model::Configuration;

/// Everything the host keeps a handle on after startup
pub struct Bootstrap {
    pub context: AppContext,
    pub metrics: Arc<PrometheusMetrics>,
    pub primary: Arc<EmbeddedPrimaryBackend>,
    pub secondary: Arc<EmbeddedSecondaryBackend>,
}

/// Load the key schema. Without a file every key is unconstrained.
pub fn load_schema(path: Option<&Path>) -> anyhow::Result<SchemaRegistry> {
    let Some(path) = path else {
        warn!("no schema file configured, all keys are unconstrained");
        return Ok(SchemaRegistry::empty());
    };

    let doc = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema file {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let schema = if is_json {
        SchemaRegistry::from_json(&doc)
    } else {
        SchemaRegistry::from_yaml(&doc)
    }
    .with_context(|| format!("invalid schema file {}", path.display()))?;

    info!(
        path = %path.display(),
        keys = schema.len(),
        sync_keys = schema.sync_keys().len(),
        "schema loaded"
    );
    Ok(schema)
}

pub fn build_context(configuration: &Configuration) -> anyhow::Result<Bootstrap> {
    let schema = load_schema(configuration.schema_file().as_deref())?;
    let metrics = Arc::new(PrometheusMetrics::new().context("failed to create metrics")?);
    let primary = Arc::new(EmbeddedPrimaryBackend::new());
    let secondary = Arc::new(EmbeddedSecondaryBackend::new());

    let service = UnifiedConfigService::builder(
        primary.clone(),
        secondary.clone(),
        Arc::new(EmbeddedAuditStore::new()),
    )
    .schema(schema)
    .settings(configuration.service_settings())
    .publisher(secondary.clone())
    .metrics(metrics.clone())
    .build();

    Ok(Bootstrap {
        context: AppContext::new(service),
        metrics,
        primary,
        secondary,
    })
}
