//! Pawn/Redeem Exchange Core
//!
//! Two-way exchange between a base currency and whole accounting units at a
//! fixed rate, net of an owner-configurable protocol fee.
//!
//! # Architecture
//!
//! - **Fee**: Tiered, capped entry fee; exit fee multiplies the capped entry fee
//! - **Ledger**: Whole-unit balances and total supply
//! - **Revenue**: Claimable fee accumulator
//! - **Engine**: Pawn, redeem, fee update and revenue claim
//! - **Single Writer**: One actor task applies every operation in order

#![forbid(unsafe_code)]
//!
//! # Invariants
//!
//! - Σ(balances) == total supply
//! - Protocol revenue never exceeds the currency held
//! - Rejected operations leave no trace
//! - Fee arithmetic is exact integer wei

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod fee;
pub mod ledger;
pub mod revenue;
pub mod rail;
pub mod engine;
pub mod storage;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;
pub mod service;

// Re-exports
pub use error::{Error, FeeField, Result};
pub use types::{AccountId, EventRecord, ExchangeEvent, Wei, EXCHANGE_RATE, FEE_UPPER_LIMIT};
pub use fee::FeeConfig;
pub use engine::{EngineState, ExchangeEngine, PawnTerms, RedeemTerms};
pub use rail::{PayoutRail, Wallets};
pub use storage::Storage;
pub use config::Config;
pub use service::Exchange;
