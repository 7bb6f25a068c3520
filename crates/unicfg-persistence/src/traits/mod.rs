//! Collaborator traits consumed by the configuration core
//!
//! The core never talks to a concrete backend. Each external system is
//! reached through one of these traits:
//! - `PrimaryBackend`: authoritative key/value store with entity tags
//! - `SecondaryBackend`: read-only client-distribution store
//! - `SecondaryPublisher`: the sync pipeline that feeds the secondary store
//! - `AuditStore`: durable append-only record store

pub mod audit;
pub mod primary;
pub mod secondary;

pub use audit::AuditStore;
pub use primary::PrimaryBackend;
pub use secondary::{SecondaryBackend, SecondaryPublisher};
