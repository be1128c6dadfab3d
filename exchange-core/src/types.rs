//! Core types for the exchange
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact integer arithmetic (wei for currency, whole units for tokens)

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Wei per whole currency unit (ether)
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Fixed exchange rate: 0.000014 ether per unit
pub const EXCHANGE_RATE: Wei = Wei(14_000_000_000_000);

/// Cap on the entry (base) fee: 0.01 ether
pub const FEE_UPPER_LIMIT: Wei = Wei(10_000_000_000_000_000);

/// Account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency amount in wei
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Wei(pub u128);

impl Wei {
    /// Zero wei
    pub const ZERO: Wei = Wei(0);

    /// Raw wei count
    pub fn as_u128(self) -> u128 {
        self.0
    }

    /// Is zero
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Wei) -> Option<Wei> {
        self.0.checked_add(other.0).map(Wei)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Wei) -> Option<Wei> {
        self.0.checked_sub(other.0).map(Wei)
    }

    /// Checked scalar multiplication
    pub fn checked_mul(self, factor: u128) -> Option<Wei> {
        self.0.checked_mul(factor).map(Wei)
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(self, other: Wei) -> Wei {
        Wei(self.0.saturating_sub(other.0))
    }

    /// Convert an ether amount to wei
    ///
    /// Returns `None` for negative amounts, sub-wei fractions, or values
    /// that do not fit.
    pub fn from_ether(ether: Decimal) -> Option<Wei> {
        if ether.is_sign_negative() && !ether.is_zero() {
            return None;
        }
        let scaled = ether.checked_mul(Decimal::from(WEI_PER_ETHER as u64))?;
        if !scaled.fract().is_zero() {
            return None;
        }
        scaled.to_u128().map(Wei)
    }

    /// Convert to an ether amount
    ///
    /// Returns `None` past ~7.9e10 ether (decimal mantissa limit).
    pub fn to_ether(self) -> Option<Decimal> {
        let mantissa = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(mantissa, 18)
            .ok()
            .map(|d| d.normalize())
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ether() {
            Some(ether) => write!(f, "{} ETH", ether),
            None => write!(f, "{} wei", self.0),
        }
    }
}

/// Notification emitted by a successful mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeEvent {
    /// Units minted against a currency deposit
    Pawned {
        /// Depositor
        account: AccountId,
        /// Units minted
        units: u64,
        /// Currency received (kept in full)
        paid: Wei,
        /// Entry fee credited to revenue
        fee: Wei,
    },

    /// Units burned and currency paid out
    Redeemed {
        /// Redeemer
        account: AccountId,
        /// Units burned
        units: u64,
        /// Currency sent to the redeemer
        payout: Wei,
        /// Exit fee credited to revenue
        fee: Wei,
    },

    /// Fee configuration replaced
    FeeUpdated {
        /// New fee factor
        factor: u8,
        /// New scale exponent (as supplied, not 10^exponent)
        scale_exponent: u8,
        /// New exit multiplier
        exit_multiplier: u32,
    },

    /// Accumulated revenue paid to the owner
    RevenueClaimed {
        /// Owner receiving the revenue
        owner: AccountId,
        /// Amount paid
        amount: Wei,
    },
}

/// Persisted, hash-chained envelope around an [`ExchangeEvent`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log (0-based, gapless)
    pub sequence: u64,

    /// Unique record ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Record timestamp (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,

    /// The notification itself
    pub event: ExchangeEvent,

    /// Hash of the previous record (zeroes for the first)
    pub previous_hash: [u8; 32],

    /// Hash of this record's contents
    pub record_hash: [u8; 32],
}

impl EventRecord {
    /// Build a record chained onto `previous_hash`
    pub fn new(
        sequence: u64,
        event: ExchangeEvent,
        previous_hash: [u8; 32],
    ) -> crate::Result<Self> {
        let mut record = Self {
            sequence,
            event_id: Uuid::now_v7(),
            timestamp_nanos: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            event,
            previous_hash,
            record_hash: [0u8; 32],
        };
        record.record_hash = record.compute_hash()?;
        Ok(record)
    }

    /// Compute record hash over everything except `record_hash`
    pub fn compute_hash(&self) -> crate::Result<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(self.sequence.to_be_bytes());
        hasher.update(self.event_id.as_bytes());
        hasher.update(self.timestamp_nanos.to_be_bytes());
        hasher.update(bincode::serialize(&self.event)?);
        hasher.update(self.previous_hash);

        Ok(hasher.finalize().into())
    }
}
