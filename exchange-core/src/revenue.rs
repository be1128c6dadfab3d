//! Protocol revenue accumulator

use crate::error::{Error, Result};
use crate::types::Wei;
use serde::{Deserialize, Serialize};

/// Running total of fees owed to the owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueAccount {
    total: Wei,
}

impl RevenueAccount {
    /// Current total
    pub fn total(&self) -> Wei {
        self.total
    }

    /// Total after crediting `fee`, without applying it
    pub fn credited(&self, fee: Wei) -> Result<Wei> {
        self.total
            .checked_add(fee)
            .ok_or(Error::ArithmeticOverflow("protocol revenue"))
    }

    /// Credit a fee
    pub fn credit(&mut self, fee: Wei) -> Result<()> {
        self.total = self.credited(fee)?;
        Ok(())
    }

    /// Zero the account, returning what it held
    pub fn drain(&mut self) -> Wei {
        std::mem::take(&mut self.total)
    }
}
