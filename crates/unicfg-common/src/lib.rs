//! Unicfg Common - Shared value model and utilities
//!
//! This crate provides the foundational types used across all unicfg components:
//! - `ConfigValue`: the tagged union every configuration value is stored as
//! - Content hashing over normalized values
//! - The value codec (wire string + content-type tag)
//! - `ConfigEntry`: one resolved key at one point in time

pub mod codec;
pub mod error;
pub mod model;
pub mod utils;
pub mod value;

// Re-exports for convenience
pub use codec::{ContentType, EncodedValue, decode, encode, infer};
pub use error::CodecError;
pub use model::{ConfigEntry, ValueSource};
pub use utils::{is_valid_key, matches_prefix};
pub use value::{ConfigValue, ValueType, content_hash};

/// Media type attached to object and array values
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Media type attached to string values
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
