//! Durable audit store trait

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{AuditEntry, AuditFilter};

/// Append-only record store, partitioned by configuration key
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a record and return its id. Records are never updated.
    async fn append(&self, entry: AuditEntry) -> StoreResult<String>;

    /// Records matching `filter`, oldest first
    async fn query(&self, filter: &AuditFilter) -> StoreResult<Vec<AuditEntry>>;
}
