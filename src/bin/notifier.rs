//! Notifier service binary.
//!
//! Consumes the configured Kafka topics and delivers push notifications until
//! Ctrl-C.

use anyhow::Context;
use notifier_core::config::ConfigManager;
use notifier_core::logging::init_structured_logging;
use notifier_core::messaging::KafkaBroker;
use notifier_core::orchestration::NotifierSystem;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = ConfigManager::load().context("loading notifier configuration")?;
    init_structured_logging(&manager.config().logging, manager.environment());

    info!(
        environment = %manager.environment(),
        config = %manager.debug_config(),
        "Starting notifier"
    );

    let broker = KafkaBroker::from_config(&manager.config().kafka)
        .context("creating Kafka consumer")?;
    let system = NotifierSystem::bootstrap(manager.config(), broker)?;
    let shutdown = system.shutdown_token();

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        }
        _ = shutdown.cancelled() => {}
    }

    system.shutdown();
    let summary = system.join().await?;
    info!(
        received = summary.received,
        partition_eofs = summary.partition_eofs,
        consume_errors = summary.consume_errors,
        "Notifier exited"
    );
    Ok(())
}
