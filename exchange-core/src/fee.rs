//! Protocol fee configuration and formula
//!
//! Effective rate is `factor / 10^scale_exponent`. The entry fee is capped at
//! [`FEE_UPPER_LIMIT`]; the exit fee multiplies the *capped* entry fee, so it
//! may exceed the cap on large redemptions.

use crate::error::{Error, FeeField, Result};
use crate::types::{Wei, FEE_UPPER_LIMIT};
use serde::{Deserialize, Serialize};

/// Lowest accepted fee factor
pub const MIN_FEE_FACTOR: u8 = 1;
/// Highest accepted fee factor
pub const MAX_FEE_FACTOR: u8 = 9;
/// Lowest accepted scale exponent
pub const MIN_FEE_DECIMALS: u8 = 2;
/// Highest accepted scale exponent
pub const MAX_FEE_DECIMALS: u8 = 18;

/// Headroom the exit multiplier shares with the scale exponent
const EXIT_MULTIPLIER_HEADROOM: u32 = 20;

/// Tunable fee parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    factor: u8,
    scale_exponent: u8,
    exit_multiplier: u32,
}

impl Default for FeeConfig {
    /// 0.8% entry, 1.6% exit
    fn default() -> Self {
        Self {
            factor: 8,
            scale_exponent: 3,
            exit_multiplier: 2,
        }
    }
}

impl FeeConfig {
    /// Validate and build a fee configuration
    ///
    /// Checks run factor, then decimals, then exit multiplier; the first
    /// violated field is reported.
    pub fn new(factor: u8, scale_exponent: u8, exit_multiplier: u32) -> Result<Self> {
        if !(MIN_FEE_FACTOR..=MAX_FEE_FACTOR).contains(&factor) {
            return Err(Error::InvalidFeeConfig {
                field: FeeField::Factor,
                value: factor.into(),
            });
        }

        if !(MIN_FEE_DECIMALS..=MAX_FEE_DECIMALS).contains(&scale_exponent) {
            return Err(Error::InvalidFeeConfig {
                field: FeeField::Decimals,
                value: scale_exponent.into(),
            });
        }

        if exit_multiplier == 0 || exit_multiplier > max_exit_multiplier(scale_exponent) {
            return Err(Error::InvalidFeeConfig {
                field: FeeField::ExitMultiplier,
                value: exit_multiplier.into(),
            });
        }

        Ok(Self {
            factor,
            scale_exponent,
            exit_multiplier,
        })
    }

    /// Fee factor
    pub fn factor(&self) -> u8 {
        self.factor
    }

    /// Scale exponent as configured
    pub fn scale_exponent(&self) -> u8 {
        self.scale_exponent
    }

    /// Derived scale, `10^scale_exponent`
    pub fn scale(&self) -> u128 {
        10u128.pow(self.scale_exponent.into())
    }

    /// Exit multiplier
    pub fn exit_multiplier(&self) -> u32 {
        self.exit_multiplier
    }

    /// Entry fee: `min(floor(amount * factor / scale), FEE_UPPER_LIMIT)`
    pub fn compute_base_fee(&self, amount: Wei) -> Result<Wei> {
        let raw = amount
            .checked_mul(self.factor.into())
            .ok_or(Error::ArithmeticOverflow("base fee"))?
            .as_u128()
            / self.scale();

        Ok(Wei(raw).min(FEE_UPPER_LIMIT))
    }

    /// Exit fee: capped base fee times the exit multiplier
    pub fn compute_exit_fee(&self, amount: Wei) -> Result<Wei> {
        self.compute_base_fee(amount)?
            .checked_mul(self.exit_multiplier.into())
            .ok_or(Error::ArithmeticOverflow("exit fee"))
    }
}

/// Largest exit multiplier accepted at a given scale exponent
///
/// The bound tightens toward the top of the scale range and never lets the
/// exit fee exceed the principal it is charged on (`9 * m <= 10^scale`).
pub fn max_exit_multiplier(scale_exponent: u8) -> u32 {
    let headroom = EXIT_MULTIPLIER_HEADROOM.saturating_sub(scale_exponent.into());
    let principal_bound = 10u128.pow(scale_exponent.into()) / u128::from(MAX_FEE_FACTOR);

    u128::from(headroom).min(principal_bound) as u32
}
