//! Application startup utilities module.

mod bootstrap;
mod logging;
mod shutdown;

pub use bootstrap::{Bootstrap, build_context, load_schema};
pub use logging::{LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{run_until_shutdown, spawn_signal_listener};
