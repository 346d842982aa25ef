//! Ledger configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Constants governing balances and copy-trade fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Starting balance of a newly provisioned wallet (native units)
    pub initial_balance: Decimal,

    /// Fixed USD price of one native unit
    pub reference_price: Decimal,

    /// Trading fee as a fraction of notional (0.001 = 0.1%)
    pub fee_rate: Decimal,

    /// Floor for the trading fee (native units)
    pub min_fee: Decimal,

    /// Flat gas fee charged on every trade (native units)
    pub gas_fee: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(1000),  // 1000 SOL per account
            reference_price: dec!(150),   // $150 per SOL
            fee_rate: dec!(0.001),        // 0.1%
            min_fee: dec!(0.01),          // 0.01 SOL
            gas_fee: dec!(0.005),         // 0.005 SOL per trade
        }
    }
}

impl LedgerConfig {
    /// Check that the constants make sense before the ledger uses them.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reference_price <= Decimal::ZERO {
            anyhow::bail!("reference price must be positive, got {}", self.reference_price);
        }
        if self.initial_balance < Decimal::ZERO {
            anyhow::bail!("initial balance cannot be negative, got {}", self.initial_balance);
        }
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            anyhow::bail!("fee rate must be in [0, 1), got {}", self.fee_rate);
        }
        if self.min_fee < Decimal::ZERO || self.gas_fee < Decimal::ZERO {
            anyhow::bail!("fees cannot be negative");
        }
        Ok(())
    }

    /// Convert a native amount to USD at the reference price, `None` on overflow.
    pub fn to_usd(&self, native: Decimal) -> Option<Decimal> {
        native.checked_mul(self.reference_price)
    }
}
