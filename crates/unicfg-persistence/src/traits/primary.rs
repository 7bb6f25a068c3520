//! Primary backend client trait

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{StoreWrite, StoredValue};

/// Authoritative configuration backend
#[async_trait]
pub trait PrimaryBackend: Send + Sync {
    /// Fetch a single key. A confirmed absence is `StoreError::NotFound`.
    async fn get(&self, key: &str) -> StoreResult<StoredValue>;

    /// Create or update a key, returning the new entity tag.
    ///
    /// When `write.if_match` is set and no longer matches the stored tag,
    /// the write is rejected with `StoreError::Conflict`.
    async fn put(&self, write: StoreWrite) -> StoreResult<String>;

    /// List every key starting with `prefix` (all keys when `None`)
    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<StoredValue>>;
}
