//! Exchange server binary

use anyhow::Context;
use exchange_core::{Config, Exchange, Wallets};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // EXCHANGE_CONFIG points at a TOML file; otherwise env + defaults
    let config = match std::env::var("EXCHANGE_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        Err(_) => Config::from_env().context("loading configuration from environment")?,
    };

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    if config.telemetry.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting exchange server"
    );

    let exchange = Exchange::open(config, Wallets::new())
        .await
        .context("opening exchange")?;
    tracing::info!("Exchange opened successfully");

    // Transport is provided by the embedding deployment
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down exchange server");
    exchange.shutdown().await?;
    Ok(())
}
