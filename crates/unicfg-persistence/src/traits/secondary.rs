//! Secondary (client-distribution) backend traits

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::StoredValue;

/// Read-only view of the client-distribution store
#[async_trait]
pub trait SecondaryBackend: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<StoredValue>;

    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<StoredValue>>;

    /// Fetch the latest published template and make it the active one.
    /// Returns whether the active values changed.
    async fn fetch_and_activate(&self) -> StoreResult<bool>;
}

/// Sync pipeline that pushes primary values toward the secondary store.
///
/// Publishing is eventually consistent: a published value becomes readable
/// through `SecondaryBackend` only after the next activation.
#[async_trait]
pub trait SecondaryPublisher: Send + Sync {
    async fn publish(&self, key: &str, value: &str, content_type: Option<&str>)
    -> StoreResult<()>;
}
