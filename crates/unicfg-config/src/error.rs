//! Error types for the configuration core

use unicfg_common::CodecError;
use unicfg_persistence::StoreError;

use crate::schema::ValidationError;

/// Error type for configuration service operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{store} store unavailable: {reason}")]
    StoreUnavailable { store: &'static str, reason: String },

    #[error("config '{0}' not found")]
    NotFound(String),

    #[error("version '{0}' cannot be rolled back")]
    NotRollbackable(String),

    #[error("concurrent write to '{key}' won, retry the update")]
    Conflict { key: String },

    #[error("{0} store is read-only")]
    ReadOnly(&'static str),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("audit log unavailable: {0}")]
    AuditUnavailable(String),
}

impl ConfigError {
    /// Map a backend error for `key` raised by the named store
    pub fn from_store(store: &'static str, key: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ConfigError::NotFound(key.to_string()),
            StoreError::Unavailable(reason) => ConfigError::StoreUnavailable { store, reason },
            StoreError::Timeout(after) => ConfigError::StoreUnavailable {
                store,
                reason: format!("timed out after {:?}", after),
            },
            StoreError::Conflict { .. } => ConfigError::Conflict {
                key: key.to_string(),
            },
            StoreError::ReadOnly => ConfigError::ReadOnly(store),
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConfigError::StoreUnavailable { .. } | ConfigError::Conflict { .. }
        )
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ConfigError::StoreUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
