//! Currency transfers in and out of the exchange
//!
//! The engine never moves currency itself. Pawn deposits are collected and
//! redeem payouts and revenue claims are delivered through a [`PayoutRail`],
//! which either moves the whole amount or fails without moving anything.

use crate::error::{Error, Result};
use crate::types::{AccountId, Wei};
use std::collections::{BTreeMap, BTreeSet};

/// Moves currency between external accounts and the exchange
pub trait PayoutRail {
    /// Take `amount` from `from`; on error nothing was taken
    ///
    /// A payer that cannot cover `amount` is reported as
    /// [`Error::InsufficientFunds`].
    fn collect(&mut self, from: &AccountId, amount: Wei) -> Result<()>;

    /// Send `amount` to `to`; on error nothing was sent
    fn send(&mut self, to: &AccountId, amount: Wei) -> Result<()>;
}

/// In-memory custody book of external currency balances
#[derive(Debug, Clone, Default)]
pub struct Wallets {
    balances: BTreeMap<AccountId, Wei>,
    rejecting: BTreeSet<AccountId>,
}

impl Wallets {
    /// Empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Currency held by `account`
    pub fn balance_of(&self, account: &AccountId) -> Wei {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Credit `amount` from outside the exchange
    pub fn fund(&mut self, account: &AccountId, amount: Wei) -> Result<()> {
        let balance = self
            .balance_of(account)
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow("wallet balance"))?;
        self.balances.insert(account.clone(), balance);
        Ok(())
    }

    /// Make `account` refuse incoming transfers
    pub fn reject_incoming(&mut self, account: &AccountId) {
        self.rejecting.insert(account.clone());
    }

    /// Let `account` receive transfers again
    pub fn accept_incoming(&mut self, account: &AccountId) {
        self.rejecting.remove(account);
    }
}

impl PayoutRail for Wallets {
    fn collect(&mut self, from: &AccountId, amount: Wei) -> Result<()> {
        let available = self.balance_of(from);
        let balance = available
            .checked_sub(amount)
            .ok_or(Error::InsufficientFunds {
                required: amount,
                available,
            })?;
        self.balances.insert(from.clone(), balance);
        Ok(())
    }

    fn send(&mut self, to: &AccountId, amount: Wei) -> Result<()> {
        if self.rejecting.contains(to) {
            return Err(Error::TransferFailed {
                recipient: to.clone(),
                amount,
                reason: "recipient rejects incoming transfers".to_string(),
            });
        }
        self.fund(to, amount).map_err(|_| Error::TransferFailed {
            recipient: to.clone(),
            amount,
            reason: "recipient balance overflow".to_string(),
        })
    }
}
