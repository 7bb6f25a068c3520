//! Unicfg Persistence - Backend collaborators for the configuration core
//!
//! This crate provides:
//! - Backend client traits for the primary and secondary configuration stores
//! - The durable audit store trait
//! - Storage model types (`StoredValue`, `AuditEntry`, `AuditFilter`)
//! - Embedded in-memory implementations of every collaborator

pub mod embedded;
pub mod error;
pub mod model;
pub mod traits;

// Re-export persistence traits
pub use traits::{AuditStore, PrimaryBackend, SecondaryBackend, SecondaryPublisher};

// Re-export embedded backends
pub use embedded::{EmbeddedAuditStore, EmbeddedPrimaryBackend, EmbeddedSecondaryBackend};

// Re-export model types
pub use error::{StoreError, StoreResult};
pub use model::{
    AuditEntry, AuditFilter, AuditKind, AuditSource, DRIFT_REPORT_KEY, PriorValue, StoreWrite,
    StoredValue,
};
