//! Exchange engine
//!
//! Orchestrates pawn/redeem against the unit [`Ledger`], the
//! [`RevenueAccount`] and the held currency reserve, plus the owner-gated
//! fee update and revenue claim.
//!
//! Every operation validates and computes first and mutates last, so a
//! rejected call leaves the engine exactly as it found it.
//!
//! # Example
//!
//! ```
//! use exchange_core::{AccountId, ExchangeEngine, FeeConfig, Wallets, Wei};
//!
//! let owner = AccountId::new("owner");
//! let alice = AccountId::new("alice");
//! let mut wallets = Wallets::new();
//! wallets.fund(&alice, Wei(1_000_000_000_000_000))?;
//! let mut engine = ExchangeEngine::new(owner, FeeConfig::default(), wallets);
//!
//! let terms = engine.quote_pawn(5)?;
//! engine.pawn(&alice, 5, terms.required)?;
//! assert_eq!(engine.balance_of(&alice), 5);
//! assert_eq!(engine.protocol_revenue(), Wei(560_000_000_000));
//! # Ok::<(), exchange_core::Error>(())
//! ```

use crate::{
    error::{Error, Result},
    fee::FeeConfig,
    ledger::Ledger,
    rail::PayoutRail,
    revenue::RevenueAccount,
    types::{AccountId, ExchangeEvent, Wei, EXCHANGE_RATE, FEE_UPPER_LIMIT},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Amounts for pawning a number of units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PawnTerms {
    /// `units * EXCHANGE_RATE`
    pub principal: Wei,
    /// Entry fee
    pub fee: Wei,
    /// Minimum payment, `principal + fee`
    pub required: Wei,
}

/// Amounts for redeeming a number of units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemTerms {
    /// `units * EXCHANGE_RATE`
    pub principal: Wei,
    /// Exit fee
    pub fee: Wei,
    /// Currency returned, `principal - fee`
    pub payout: Wei,
}

/// Serializable engine state (everything except the rail and pending events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// Owner authorized for admin operations
    pub owner: AccountId,
    /// Current fee parameters
    pub fee_config: FeeConfig,
    /// Unit balances
    pub ledger: Ledger,
    /// Accumulated protocol revenue
    pub revenue: RevenueAccount,
    /// Currency held by the engine
    pub reserve: Wei,
}

/// Two-way currency/unit exchange
#[derive(Debug)]
pub struct ExchangeEngine<R> {
    owner: AccountId,
    fee_config: FeeConfig,
    ledger: Ledger,
    revenue: RevenueAccount,
    reserve: Wei,
    rail: R,
    events: Vec<ExchangeEvent>,
}

impl<R: PayoutRail> ExchangeEngine<R> {
    /// Fresh engine with no balances, no revenue and an empty reserve
    pub fn new(owner: AccountId, fee_config: FeeConfig, rail: R) -> Self {
        Self::from_parts(
            EngineState {
                owner,
                fee_config,
                ledger: Ledger::new(),
                revenue: RevenueAccount::default(),
                reserve: Wei::ZERO,
            },
            rail,
        )
    }

    /// Rebuild an engine from a snapshot, re-checking every invariant
    pub fn restore(state: EngineState, rail: R) -> Result<Self> {
        let fee = state.fee_config;
        FeeConfig::new(fee.factor(), fee.scale_exponent(), fee.exit_multiplier())?;

        let engine = Self::from_parts(state, rail);
        engine.check_invariants()?;
        Ok(engine)
    }

    fn from_parts(state: EngineState, rail: R) -> Self {
        Self {
            owner: state.owner,
            fee_config: state.fee_config,
            ledger: state.ledger,
            revenue: state.revenue,
            reserve: state.reserve,
            rail,
            events: Vec::new(),
        }
    }

    /// Copy of the persistent state
    pub fn snapshot(&self) -> EngineState {
        EngineState {
            owner: self.owner.clone(),
            fee_config: self.fee_config,
            ledger: self.ledger.clone(),
            revenue: self.revenue,
            reserve: self.reserve,
        }
    }

    // Read-only accessors

    /// Owner account
    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    /// Currency per unit
    pub fn exchange_rate(&self) -> Wei {
        EXCHANGE_RATE
    }

    /// Cap on the entry fee
    pub fn fee_upper_limit(&self) -> Wei {
        FEE_UPPER_LIMIT
    }

    /// Current fee parameters
    pub fn fee_config(&self) -> &FeeConfig {
        &self.fee_config
    }

    /// Revenue claimable by the owner
    pub fn protocol_revenue(&self) -> Wei {
        self.revenue.total()
    }

    /// Units held by `account`
    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.ledger.balance_of(account)
    }

    /// Units outstanding
    pub fn total_supply(&self) -> u64 {
        self.ledger.total_supply()
    }

    /// Currency held by the engine
    pub fn reserve(&self) -> Wei {
        self.reserve
    }

    /// Reserve left after revenue and the principal backing all
    /// outstanding units; retained overpayments accumulate here
    pub fn surplus(&self) -> Wei {
        let backing = EXCHANGE_RATE
            .checked_mul(self.ledger.total_supply().into())
            .unwrap_or(Wei(u128::MAX));
        self.reserve
            .saturating_sub(self.revenue.total())
            .saturating_sub(backing)
    }

    /// Payout rail
    pub fn rail(&self) -> &R {
        &self.rail
    }

    /// Payout rail, mutably (host-side funding, test control)
    pub fn rail_mut(&mut self) -> &mut R {
        &mut self.rail
    }

    /// Drain notifications recorded since the last call
    pub fn take_events(&mut self) -> Vec<ExchangeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Check `Σ balances == total supply` and `revenue <= reserve`
    pub fn check_invariants(&self) -> Result<()> {
        self.ledger.check_supply()?;

        if self.revenue.total() > self.reserve {
            return Err(Error::InvariantViolation(format!(
                "protocol revenue {} exceeds reserve {}",
                self.revenue.total(),
                self.reserve
            )));
        }
        Ok(())
    }

    // Quotes

    fn principal(units: u64) -> Result<Wei> {
        if units == 0 {
            return Err(Error::InvalidExchangeAmount { amount: units });
        }
        EXCHANGE_RATE
            .checked_mul(units.into())
            .ok_or(Error::ArithmeticOverflow("principal"))
    }

    /// Payment required to pawn `units`
    pub fn quote_pawn(&self, units: u64) -> Result<PawnTerms> {
        let principal = Self::principal(units)?;
        let fee = self.fee_config.compute_base_fee(principal)?;
        let required = principal
            .checked_add(fee)
            .ok_or(Error::ArithmeticOverflow("pawn requirement"))?;

        Ok(PawnTerms {
            principal,
            fee,
            required,
        })
    }

    /// Payout for redeeming `units`
    pub fn quote_redeem(&self, units: u64) -> Result<RedeemTerms> {
        let principal = Self::principal(units)?;
        let fee = self.fee_config.compute_exit_fee(principal)?;
        let payout = principal
            .checked_sub(fee)
            .ok_or(Error::ArithmeticOverflow("exit fee exceeds principal"))?;

        Ok(RedeemTerms {
            principal,
            fee,
            payout,
        })
    }

    // Operations

    /// Mint `units` to `caller` against a payment of `paid`
    ///
    /// `paid` is collected from the caller through the rail. The whole
    /// payment is retained; anything above the requirement is not refunded.
    pub fn pawn(&mut self, caller: &AccountId, units: u64, paid: Wei) -> Result<PawnTerms> {
        let terms = self.quote_pawn(units)?;

        if paid < terms.required {
            return Err(Error::InsufficientFunds {
                required: terms.required,
                available: paid,
            });
        }

        let reserve = self
            .reserve
            .checked_add(paid)
            .ok_or(Error::ArithmeticOverflow("reserve"))?;
        self.revenue.credited(terms.fee)?;
        self.ledger.ensure_mintable(units)?;

        self.rail.collect(caller, paid)?;

        self.ledger.mint(caller, units)?;
        self.reserve = reserve;
        self.revenue.credit(terms.fee)?;

        info!(
            account = %caller,
            units,
            paid = %paid,
            fee = %terms.fee,
            "Pawned"
        );
        self.events.push(ExchangeEvent::Pawned {
            account: caller.clone(),
            units,
            paid,
            fee: terms.fee,
        });

        Ok(terms)
    }

    /// Burn `units` from `caller` and pay out principal net of the exit fee
    pub fn redeem(&mut self, caller: &AccountId, units: u64) -> Result<RedeemTerms> {
        if units == 0 {
            return Err(Error::InvalidExchangeAmount { amount: units });
        }
        self.ledger.ensure_burnable(caller, units)?;

        let terms = self.quote_redeem(units)?;
        let revenue = self.revenue.credited(terms.fee)?;

        // Revenue stays fully backed after the payout leaves
        let available = self.reserve.saturating_sub(revenue);
        if available < terms.payout {
            return Err(Error::InsufficientFunds {
                required: terms.payout,
                available,
            });
        }

        self.rail.send(caller, terms.payout)?;

        self.ledger.burn(caller, units)?;
        self.reserve = self.reserve.saturating_sub(terms.payout);
        self.revenue.credit(terms.fee)?;

        info!(
            account = %caller,
            units,
            payout = %terms.payout,
            fee = %terms.fee,
            "Redeemed"
        );
        self.events.push(ExchangeEvent::Redeemed {
            account: caller.clone(),
            units,
            payout: terms.payout,
            fee: terms.fee,
        });

        Ok(terms)
    }

    fn ensure_owner(&self, caller: &AccountId, operation: &str) -> Result<()> {
        if caller != &self.owner {
            warn!(caller = %caller, operation, "Rejected admin operation from non-owner");
            return Err(Error::NotOwner {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Replace the fee configuration (owner only)
    pub fn update_fee(
        &mut self,
        caller: &AccountId,
        factor: u8,
        scale_exponent: u8,
        exit_multiplier: u32,
    ) -> Result<()> {
        self.ensure_owner(caller, "update_fee")?;

        let fee_config = FeeConfig::new(factor, scale_exponent, exit_multiplier).map_err(|e| {
            warn!(factor, scale_exponent, exit_multiplier, error = %e, "Fee update rejected");
            e
        })?;
        self.fee_config = fee_config;

        info!(factor, scale_exponent, exit_multiplier, "Fee configuration updated");
        self.events.push(ExchangeEvent::FeeUpdated {
            factor,
            scale_exponent,
            exit_multiplier,
        });

        Ok(())
    }

    /// Pay all accumulated revenue to the owner (owner only)
    ///
    /// Revenue is zeroed only once the transfer has gone through. Claiming
    /// at zero still asks the rail to deliver, but records no event.
    pub fn claim_revenue(&mut self, caller: &AccountId) -> Result<Wei> {
        self.ensure_owner(caller, "claim_revenue")?;

        let amount = self.revenue.total();
        self.rail.send(&self.owner, amount)?;

        self.revenue.drain();
        self.reserve = self.reserve.saturating_sub(amount);

        if !amount.is_zero() {
            info!(owner = %self.owner, amount = %amount, "Revenue claimed");
            self.events.push(ExchangeEvent::RevenueClaimed {
                owner: self.owner.clone(),
                amount,
            });
        }

        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeeField;
    use crate::rail::Wallets;

    fn owner() -> AccountId {
        AccountId::new("owner")
    }

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    /// Alice's starting wallet: 1 ether
    const ALICE_FUNDS: Wei = Wei(1_000_000_000_000_000_000);

    fn engine() -> ExchangeEngine<Wallets> {
        let mut wallets = Wallets::new();
        wallets.fund(&alice(), ALICE_FUNDS).unwrap();
        ExchangeEngine::new(owner(), FeeConfig::default(), wallets)
    }

    #[test]
    fn test_accessors() {
        let engine = engine();
        assert_eq!(engine.owner(), &owner());
        assert_eq!(engine.exchange_rate(), EXCHANGE_RATE);
        assert_eq!(engine.fee_upper_limit(), FEE_UPPER_LIMIT);
        assert_eq!(engine.fee_config(), &FeeConfig::default());
        assert_eq!(engine.protocol_revenue(), Wei::ZERO);
        assert_eq!(engine.total_supply(), 0);
    }

    #[test]
    fn test_pawn_zero_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.pawn(&alice(), 0, Wei(1)),
            Err(Error::InvalidExchangeAmount { amount: 0 })
        ));
    }

    #[test]
    fn test_pawn_underpaid_leaves_state() {
        let mut engine = engine();
        let before = engine.snapshot();

        match engine.pawn(&alice(), 5, Wei(70_559_999_999_999)) {
            Err(Error::InsufficientFunds {
                required,
                available,
            }) => {
                assert_eq!(required, Wei(70_560_000_000_000));
                assert_eq!(available, Wei(70_559_999_999_999));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(engine.snapshot(), before);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_pawn_overpayment_retained() {
        let mut engine = engine();
        let terms = engine.quote_pawn(5).unwrap();
        let paid = terms.required.checked_add(Wei(1_000)).unwrap();

        engine.pawn(&alice(), 5, paid).unwrap();
        assert_eq!(engine.reserve(), paid);
        assert_eq!(engine.protocol_revenue(), terms.fee);
        assert_eq!(engine.surplus(), Wei(1_000));
    }

    #[test]
    fn test_pawn_collects_payment() {
        let mut engine = engine();
        let terms = engine.quote_pawn(5).unwrap();

        engine.pawn(&alice(), 5, terms.required).unwrap();
        assert_eq!(
            engine.rail().balance_of(&alice()),
            ALICE_FUNDS.saturating_sub(terms.required)
        );
        assert_eq!(engine.reserve(), terms.required);
    }

    #[test]
    fn test_pawn_unfunded_caller_leaves_state() {
        let mut engine = engine();
        let bob = AccountId::new("bob");
        engine.rail_mut().fund(&bob, Wei(1_000)).unwrap();
        let terms = engine.quote_pawn(5).unwrap();
        let before = engine.snapshot();

        match engine.pawn(&bob, 5, terms.required) {
            Err(Error::InsufficientFunds {
                required,
                available,
            }) => {
                assert_eq!(required, terms.required);
                assert_eq!(available, Wei(1_000));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.rail().balance_of(&bob), Wei(1_000));
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_redeem_zero_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.redeem(&alice(), 0),
            Err(Error::InvalidExchangeAmount { amount: 0 })
        ));
    }

    #[test]
    fn test_redeem_without_balance() {
        let mut engine = engine();
        match engine.redeem(&alice(), 4) {
            Err(Error::InsufficientBalance {
                account,
                available,
                requested,
            }) => {
                assert_eq!(account, alice());
                assert_eq!(available, 0);
                assert_eq!(requested, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_redeem_pays_out_through_rail() {
        let mut engine = engine();
        let pawn = engine.quote_pawn(10).unwrap();
        engine.pawn(&alice(), 10, pawn.required).unwrap();

        let redeem = engine.redeem(&alice(), 10).unwrap();
        assert_eq!(redeem.fee, pawn.fee.checked_mul(2).unwrap());
        assert_eq!(
            engine.rail().balance_of(&alice()),
            ALICE_FUNDS
                .saturating_sub(pawn.required)
                .checked_add(redeem.payout)
                .unwrap()
        );
        assert_eq!(engine.balance_of(&alice()), 0);
        assert_eq!(
            engine.protocol_revenue(),
            pawn.fee.checked_add(redeem.fee).unwrap()
        );
        assert_eq!(engine.reserve(), engine.protocol_revenue());
        engine.check_invariants().unwrap();
    }

    #[test]
    fn test_redeem_rail_failure_leaves_state() {
        let mut engine = engine();
        let pawn = engine.quote_pawn(10).unwrap();
        engine.pawn(&alice(), 10, pawn.required).unwrap();
        engine.take_events();
        engine.rail_mut().reject_incoming(&alice());
        let before = engine.snapshot();

        assert!(matches!(
            engine.redeem(&alice(), 10),
            Err(Error::TransferFailed { .. })
        ));
        assert_eq!(engine.snapshot(), before);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_redeem_underfunded_reserve() {
        let mut ledger = Ledger::new();
        ledger.mint(&alice(), 10).unwrap();
        let state = EngineState {
            owner: owner(),
            fee_config: FeeConfig::default(),
            ledger,
            revenue: RevenueAccount::default(),
            reserve: Wei(1_000),
        };
        let mut engine = ExchangeEngine::restore(state.clone(), Wallets::new()).unwrap();

        let terms = engine.quote_redeem(10).unwrap();
        match engine.redeem(&alice(), 10) {
            Err(Error::InsufficientFunds {
                required,
                available,
            }) => {
                assert_eq!(required, terms.payout);
                assert_eq!(available, Wei(1_000).saturating_sub(terms.fee));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(engine.snapshot(), state);
    }

    #[test]
    fn test_update_fee_owner_only() {
        let mut engine = engine();
        assert!(matches!(
            engine.update_fee(&alice(), 1, 2, 2),
            Err(Error::NotOwner { .. })
        ));
        assert_eq!(engine.fee_config(), &FeeConfig::default());
    }

    #[test]
    fn test_update_fee_stores_input_exponent() {
        let mut engine = engine();
        engine.update_fee(&owner(), 5, 4, 3).unwrap();

        assert_eq!(engine.fee_config().factor(), 5);
        assert_eq!(engine.fee_config().scale_exponent(), 4);
        assert_eq!(engine.fee_config().exit_multiplier(), 3);
        assert_eq!(
            engine.take_events(),
            vec![ExchangeEvent::FeeUpdated {
                factor: 5,
                scale_exponent: 4,
                exit_multiplier: 3,
            }]
        );
    }

    #[test]
    fn test_update_fee_rejection_keeps_config() {
        let mut engine = engine();
        assert!(matches!(
            engine.update_fee(&owner(), 1, 18, 6),
            Err(Error::InvalidFeeConfig {
                field: FeeField::ExitMultiplier,
                value: 6
            })
        ));
        assert_eq!(engine.fee_config(), &FeeConfig::default());
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_claim_revenue() {
        let mut engine = engine();
        let terms = engine.quote_pawn(5).unwrap();
        engine.pawn(&alice(), 5, terms.required).unwrap();

        assert!(matches!(
            engine.claim_revenue(&alice()),
            Err(Error::NotOwner { .. })
        ));

        let claimed = engine.claim_revenue(&owner()).unwrap();
        assert_eq!(claimed, terms.fee);
        assert_eq!(engine.protocol_revenue(), Wei::ZERO);
        assert_eq!(engine.rail().balance_of(&owner()), terms.fee);
        assert_eq!(engine.reserve(), terms.principal);

        // Second claim is a no-op
        assert_eq!(engine.claim_revenue(&owner()).unwrap(), Wei::ZERO);
        assert_eq!(engine.rail().balance_of(&owner()), terms.fee);
    }

    #[test]
    fn test_claim_revenue_transfer_failure_keeps_revenue() {
        let mut engine = engine();
        let terms = engine.quote_pawn(5).unwrap();
        engine.pawn(&alice(), 5, terms.required).unwrap();
        engine.rail_mut().reject_incoming(&owner());

        assert!(matches!(
            engine.claim_revenue(&owner()),
            Err(Error::TransferFailed { .. })
        ));
        assert_eq!(engine.protocol_revenue(), terms.fee);
        assert_eq!(engine.reserve(), terms.required);
    }

    #[test]
    fn test_restore_rejects_bad_state() {
        let mut state = engine().snapshot();
        state.revenue.credit(Wei(10)).unwrap();
        assert!(matches!(
            ExchangeEngine::restore(state, Wallets::new()),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut engine = engine();
        let terms = engine.quote_pawn(7).unwrap();
        engine.pawn(&alice(), 7, terms.required).unwrap();

        let restored = ExchangeEngine::restore(engine.snapshot(), Wallets::new()).unwrap();
        assert_eq!(restored.snapshot(), engine.snapshot());
    }
}
