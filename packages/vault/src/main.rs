use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use vault::config::AppConfig;
use vault::gc::run_reconciliation_loop;
use vault::state::VaultState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;
    info!(
        backend = ?config.storage.backend,
        interval_secs = config.gc.interval_secs,
        "Vault collector starting"
    );

    let state = VaultState::connect(config)
        .await
        .context("Failed to connect to backing stores")?;

    let shutdown = CancellationToken::new();
    let collector = tokio::spawn(run_reconciliation_loop(state, shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    shutdown.cancel();

    if let Err(e) = collector.await {
        error!(error = %e, "Collector task panicked");
    }

    Ok(())
}
