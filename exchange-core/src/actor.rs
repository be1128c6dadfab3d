//! Actor-based host for the exchange engine
//!
//! The engine itself is a plain synchronous state machine. This module gives
//! it a single writer: every request from every [`EngineHandle`] goes through
//! one bounded mailbox and is applied to completion before the next is read,
//! so callers observe a total order and never a half-applied operation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               EngineHandle (Clone)                    │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              EngineActor (Single Task)                │
//! │   ExchangeEngine::pawn / redeem / update_fee / ...    │
//! │                       │                               │
//! │                       ▼                               │
//! │     Storage::commit(events, snapshot)                 │
//! │          (atomic write to RocksDB)                    │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    engine::{EngineState, ExchangeEngine, PawnTerms, RedeemTerms},
    metrics::Metrics,
    rail::PayoutRail,
    types::{AccountId, ExchangeEvent, Wei},
    Error, Result, Storage,
};
use tokio::sync::{mpsc, oneshot};

/// Message sent to the engine actor
#[derive(Debug)]
pub enum EngineMessage {
    /// Mint units against a payment
    Pawn {
        caller: AccountId,
        units: u64,
        paid: Wei,
        response: oneshot::Sender<Result<PawnTerms>>,
    },

    /// Burn units for a payout
    Redeem {
        caller: AccountId,
        units: u64,
        response: oneshot::Sender<Result<RedeemTerms>>,
    },

    /// Replace the fee configuration
    UpdateFee {
        caller: AccountId,
        factor: u8,
        scale_exponent: u8,
        exit_multiplier: u32,
        response: oneshot::Sender<Result<()>>,
    },

    /// Pay revenue to the owner
    ClaimRevenue {
        caller: AccountId,
        response: oneshot::Sender<Result<Wei>>,
    },

    /// Read the current state
    Snapshot {
        response: oneshot::Sender<EngineState>,
    },

    /// Read one account's unit balance
    BalanceOf {
        account: AccountId,
        response: oneshot::Sender<u64>,
    },

    /// Flush, close storage and stop
    Shutdown { response: oneshot::Sender<()> },
}

/// Actor that owns the engine and its storage
pub struct EngineActor<R> {
    engine: ExchangeEngine<R>,
    storage: Storage,
    metrics: Option<Metrics>,
    mailbox: mpsc::Receiver<EngineMessage>,

    /// Events applied in memory but not yet written
    unpersisted: Vec<ExchangeEvent>,
}

impl<R> std::fmt::Debug for EngineActor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineActor")
            .field("storage", &self.storage)
            .field("unpersisted", &self.unpersisted.len())
            .finish_non_exhaustive()
    }
}

impl<R: PayoutRail> EngineActor<R> {
    /// Create new actor
    pub fn new(
        engine: ExchangeEngine<R>,
        storage: Storage,
        metrics: Option<Metrics>,
        mailbox: mpsc::Receiver<EngineMessage>,
    ) -> Self {
        if let Some(metrics) = &metrics {
            metrics.observe_state(&engine.snapshot());
        }
        Self {
            engine,
            storage,
            metrics,
            mailbox,
            unpersisted: Vec::new(),
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                EngineMessage::Shutdown { response } => {
                    self.finish();
                    let _ = response.send(());
                    return;
                }
                msg => self.handle_message(msg),
            }
        }

        // Mailbox closed: every handle dropped
        self.finish();
    }

    fn handle_message(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::Pawn {
                caller,
                units,
                paid,
                response,
            } => {
                let result = self.apply("pawn", |engine| engine.pawn(&caller, units, paid));
                let _ = response.send(result);
            }

            EngineMessage::Redeem {
                caller,
                units,
                response,
            } => {
                let result = self.apply("redeem", |engine| engine.redeem(&caller, units));
                let _ = response.send(result);
            }

            EngineMessage::UpdateFee {
                caller,
                factor,
                scale_exponent,
                exit_multiplier,
                response,
            } => {
                let result = self.apply("update_fee", |engine| {
                    engine.update_fee(&caller, factor, scale_exponent, exit_multiplier)
                });
                let _ = response.send(result);
            }

            EngineMessage::ClaimRevenue { caller, response } => {
                let result = self.apply("claim_revenue", |engine| engine.claim_revenue(&caller));
                let _ = response.send(result);
            }

            EngineMessage::Snapshot { response } => {
                let _ = response.send(self.engine.snapshot());
            }

            EngineMessage::BalanceOf { account, response } => {
                let _ = response.send(self.engine.balance_of(&account));
            }

            EngineMessage::Shutdown { .. } => {
                // Handled in main loop
            }
        }
    }

    /// Run one engine operation and persist what it changed
    ///
    /// A persistence failure does not undo the operation (a payout may
    /// already have left); its events are kept and written with the next
    /// successful commit.
    fn apply<T>(
        &mut self,
        operation: &'static str,
        op: impl FnOnce(&mut ExchangeEngine<R>) -> Result<T>,
    ) -> Result<T> {
        match op(&mut self.engine) {
            Ok(value) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_success(operation);
                }
                let events = self.engine.take_events();
                self.unpersisted.extend(events);
                self.persist();
                Ok(value)
            }
            Err(e) => {
                if e.is_rejection() {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rejection(operation);
                    }
                    tracing::debug!(operation, error = %e, "Operation rejected");
                } else {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_failure(operation);
                    }
                    tracing::error!(operation, error = %e, "Operation failed");
                }
                Err(e)
            }
        }
    }

    fn persist(&mut self) {
        let state = self.engine.snapshot();
        if let Some(metrics) = &self.metrics {
            metrics.observe_state(&state);
        }

        match self.storage.commit(self.unpersisted.clone(), &state) {
            Ok(_) => self.unpersisted.clear(),
            Err(e) => {
                tracing::error!(
                    pending = self.unpersisted.len(),
                    error = %e,
                    "Failed to persist exchange state"
                );
            }
        }
    }

    fn finish(mut self) {
        if !self.unpersisted.is_empty() {
            self.persist();
        }
        if let Err(e) = self.storage.close() {
            tracing::error!("Error closing storage: {}", e);
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineMessage>,
}

impl EngineHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<EngineMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Mint `units` to `caller` against `paid`
    pub async fn pawn(&self, caller: AccountId, units: u64, paid: Wei) -> Result<PawnTerms> {
        self.request(|response| EngineMessage::Pawn {
            caller,
            units,
            paid,
            response,
        })
        .await?
    }

    /// Burn `units` from `caller` for a payout
    pub async fn redeem(&self, caller: AccountId, units: u64) -> Result<RedeemTerms> {
        self.request(|response| EngineMessage::Redeem {
            caller,
            units,
            response,
        })
        .await?
    }

    /// Replace the fee configuration (owner only)
    pub async fn update_fee(
        &self,
        caller: AccountId,
        factor: u8,
        scale_exponent: u8,
        exit_multiplier: u32,
    ) -> Result<()> {
        self.request(|response| EngineMessage::UpdateFee {
            caller,
            factor,
            scale_exponent,
            exit_multiplier,
            response,
        })
        .await?
    }

    /// Pay accumulated revenue to the owner (owner only)
    pub async fn claim_revenue(&self, caller: AccountId) -> Result<Wei> {
        self.request(|response| EngineMessage::ClaimRevenue { caller, response })
            .await?
    }

    /// Current engine state
    pub async fn snapshot(&self) -> Result<EngineState> {
        self.request(|response| EngineMessage::Snapshot { response })
            .await
    }

    /// Units held by `account`
    pub async fn balance_of(&self, account: AccountId) -> Result<u64> {
        self.request(|response| EngineMessage::BalanceOf { account, response })
            .await
    }

    /// Flush and stop the actor; resolves once storage is closed
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response| EngineMessage::Shutdown { response })
            .await
    }
}

/// Spawn the engine actor
pub fn spawn_engine_actor<R>(
    engine: ExchangeEngine<R>,
    storage: Storage,
    metrics: Option<Metrics>,
    mailbox_capacity: usize,
) -> EngineHandle
where
    R: PayoutRail + Send + 'static,
{
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = EngineActor::new(engine, storage, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    EngineHandle::new(tx)
}
