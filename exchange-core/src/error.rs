//! Error types for the exchange engine

use crate::types::{AccountId, Wei};
use std::fmt;
use thiserror::Error;

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fee configuration field rejected by `update_fee`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeField {
    /// Fee factor (numerator of the fee rate)
    Factor,
    /// Fee scale exponent (decimals of the fee rate)
    Decimals,
    /// Exit fee multiplier
    ExitMultiplier,
}

impl fmt::Display for FeeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeField::Factor => write!(f, "fee factor"),
            FeeField::Decimals => write!(f, "fee decimals"),
            FeeField::ExitMultiplier => write!(f, "exit multiplier"),
        }
    }
}

/// Exchange errors
///
/// Every business failure is a pure rejection: the engine state is left
/// exactly as it was before the call.
#[derive(Error, Debug)]
pub enum Error {
    /// Zero unit amount supplied to pawn/redeem
    #[error("Invalid exchange amount: {amount}")]
    InvalidExchangeAmount {
        /// Rejected unit amount
        amount: u64,
    },

    /// Supplied (or held) currency does not cover the computed requirement
    ///
    /// For pawn, `available` is the payment supplied or, when the payment
    /// cannot be collected, what the payer holds. For redeem, it is the
    /// reserve left once revenue including this exit fee is set aside,
    /// `reserve - (revenue + exit fee)`, not the whole reserve.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Currency needed
        required: Wei,
        /// Currency available (see variant docs for redeem)
        available: Wei,
    },

    /// Burn requested more units than the account holds
    #[error("Insufficient balance for {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Account being debited
        account: AccountId,
        /// Units held
        available: u64,
        /// Units requested
        requested: u64,
    },

    /// Fee update rejected
    #[error("Invalid fee configuration: {field} = {value}")]
    InvalidFeeConfig {
        /// Offending field
        field: FeeField,
        /// Offending value
        value: u64,
    },

    /// Admin operation invoked by someone other than the owner
    #[error("Caller {caller} is not the owner")]
    NotOwner {
        /// Rejected caller
        caller: AccountId,
    },

    /// Outbound currency transfer could not complete
    #[error("Transfer of {amount} to {recipient} failed: {reason}")]
    TransferFailed {
        /// Intended recipient
        recipient: AccountId,
        /// Amount that was not sent
        amount: Wei,
        /// Rail-specific reason
        reason: String,
    },

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(&'static str),

    /// Invariant violation (supply mismatch, revenue above reserve, broken log)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is a business rejection (as opposed to an
    /// infrastructure failure of the host)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidExchangeAmount { .. }
                | Error::InsufficientFunds { .. }
                | Error::InsufficientBalance { .. }
                | Error::InvalidFeeConfig { .. }
                | Error::NotOwner { .. }
                | Error::TransferFailed { .. }
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_field() {
        let err = Error::InvalidFeeConfig {
            field: FeeField::Decimals,
            value: 19,
        };
        assert_eq!(err.to_string(), "Invalid fee configuration: fee decimals = 19");
    }

    #[test]
    fn test_rejection_classification() {
        assert!(Error::InvalidExchangeAmount { amount: 0 }.is_rejection());
        assert!(Error::NotOwner {
            caller: AccountId::new("mallory")
        }
        .is_rejection());
        assert!(!Error::Storage("disk full".to_string()).is_rejection());
        assert!(!Error::Concurrency("closed".to_string()).is_rejection());
    }
}
