//! Exchange service orchestration
//!
//! Ties storage, engine and actor together: restores the engine from the
//! latest snapshot (or builds a fresh one from configuration) and hands out
//! an [`EngineHandle`].
//!
//! # Example
//!
//! ```no_run
//! use exchange_core::{AccountId, Config, Exchange, Wallets, Wei};
//!
//! #[tokio::main]
//! async fn main() -> exchange_core::Result<()> {
//!     let alice = AccountId::new("alice");
//!     let mut wallets = Wallets::new();
//!     wallets.fund(&alice, Wei(1_000_000_000_000_000))?;
//!
//!     let exchange = Exchange::open(Config::default(), wallets).await?;
//!     let handle = exchange.handle();
//!     handle.pawn(alice, 5, Wei(70_560_000_000_000)).await?;
//!
//!     exchange.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_engine_actor, EngineHandle},
    engine::ExchangeEngine,
    metrics::Metrics,
    rail::PayoutRail,
    Config, Error, Result, Storage,
};

/// Running exchange service
#[derive(Debug)]
pub struct Exchange {
    handle: EngineHandle,
    metrics: Option<Metrics>,
    config: Config,
}

impl Exchange {
    /// Open storage, restore or create the engine, and start the actor
    pub async fn open<R>(config: Config, rail: R) -> Result<Self>
    where
        R: PayoutRail + Send + 'static,
    {
        config.validate()?;
        let storage = Storage::open(&config)?;
        let verified = storage.verify_chain()?;

        let engine = match storage.load_state()? {
            Some(state) => {
                tracing::info!(
                    owner = %state.owner,
                    events = verified,
                    "Restoring exchange from snapshot"
                );
                ExchangeEngine::restore(state, rail)?
            }
            None => {
                tracing::info!(owner = %config.owner, "Starting fresh exchange");
                ExchangeEngine::new(config.owner_account(), config.fee_config()?, rail)
            }
        };

        let metrics = if config.telemetry.metrics_enabled {
            Some(
                Metrics::new()
                    .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?,
            )
        } else {
            None
        };

        let handle = spawn_engine_actor(
            engine,
            storage,
            metrics.clone(),
            config.actor.mailbox_capacity,
        );

        Ok(Self {
            handle,
            metrics,
            config,
        })
    }

    /// Handle for submitting operations
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Metrics collector, if enabled
    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown the service
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}
