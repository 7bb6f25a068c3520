//! Main entry point for the unicfg server.

use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, warn};

use unicfg_server::model::{Cli, Configuration};
use unicfg_server::startup;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = Configuration::load(&cli)?;
    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    let bootstrap = startup::build_context(&configuration)?;
    let context = bootstrap.context;
    let settings = context.service().settings();
    info!(
        environment = %settings.environment,
        cache_ttl = ?settings.cache_ttl,
        drift_interval = ?settings.drift_interval,
        "starting unicfg server"
    );

    let receiver = context.shutdown_signal().subscribe();
    startup::spawn_signal_listener(context.shutdown_signal());
    context.start();

    let report = context.service().refresh().await;
    info!(
        checked = report.checked(),
        drifted = report.drifted_keys.len(),
        "initial drift check complete"
    );

    startup::run_until_shutdown(&context, receiver, SHUTDOWN_TIMEOUT).await;

    match bootstrap.metrics.gather() {
        Ok(text) => debug!(metrics = %text, "final metrics"),
        Err(e) => warn!(error = %e, "failed to render metrics"),
    }
    Ok(())
}
