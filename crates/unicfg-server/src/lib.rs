//! Unicfg Server - host process for the unified configuration service
//!
//! Loads settings and the key schema, initializes logging, and runs the
//! service over the embedded stores until Ctrl+C or SIGTERM.

pub mod model;
pub mod startup;
