//! Unit balance book
//!
//! Per-account whole-unit balances and total supply. Mint and burn either
//! apply fully or leave the book untouched.

use crate::error::{Error, Result};
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unit balances and total supply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    balances: BTreeMap<AccountId, u64>,
    total_supply: u64,
}

impl Ledger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Units held by `account`
    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Accounts with a non-zero balance
    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, u64)> {
        self.balances.iter().map(|(account, units)| (account, *units))
    }

    /// Fail unless `amount` units can be minted
    pub fn ensure_mintable(&self, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(Error::InvalidExchangeAmount { amount });
        }
        self.total_supply
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow("total supply"))
    }

    /// Credit `amount` units to `account`
    pub fn mint(&mut self, account: &AccountId, amount: u64) -> Result<()> {
        let total_supply = self.ensure_mintable(amount)?;
        // Bounded by total supply, so cannot overflow once the check above passes
        *self.balances.entry(account.clone()).or_insert(0) += amount;
        self.total_supply = total_supply;

        Ok(())
    }

    /// Fail unless `account` holds at least `amount` units
    pub fn ensure_burnable(&self, account: &AccountId, amount: u64) -> Result<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(Error::InsufficientBalance {
                account: account.clone(),
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Debit `amount` units from `account`
    pub fn burn(&mut self, account: &AccountId, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidExchangeAmount { amount });
        }
        self.ensure_burnable(account, amount)?;

        let remaining = self.balance_of(account) - amount;
        if remaining == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.clone(), remaining);
        }
        self.total_supply -= amount;

        Ok(())
    }

    /// Check that balances sum to total supply
    pub fn check_supply(&self) -> Result<()> {
        let sum = self
            .balances
            .values()
            .try_fold(0u64, |acc, units| acc.checked_add(*units))
            .ok_or(Error::ArithmeticOverflow("balance sum"))?;

        if sum != self.total_supply {
            return Err(Error::InvariantViolation(format!(
                "balances sum to {} but total supply is {}",
                sum, self.total_supply
            )));
        }
        Ok(())
    }
}
