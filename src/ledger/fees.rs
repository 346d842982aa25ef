//! Trade cost calculation.
//!
//! fee      = max(notional * fee_rate, min_fee)
//! gas_fee  = flat per trade
//! total    = fee + gas_fee

use rust_decimal::Decimal;

use super::LedgerConfig;

/// Native-unit costs of one simulated trade, computed once and reused.
///
/// A quote only exists when every derived amount fits in a `Decimal`, so the
/// accessors below never overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeCosts {
    /// `token_amount * unit_price`
    pub total_usd: Decimal,
    /// Trade value in native units
    pub notional: Decimal,
    pub fee: Decimal,
    pub gas_fee: Decimal,
}

impl TradeCosts {
    /// Price a trade of `token_amount` tokens at `unit_price` USD each.
    ///
    /// Returns `None` when the amounts are too large to represent.
    pub fn quote(config: &LedgerConfig, token_amount: Decimal, unit_price: Decimal) -> Option<Self> {
        let total_usd = token_amount.checked_mul(unit_price)?;
        let notional = total_usd.checked_div(config.reference_price)?;
        let fee = calculate_fee(config, notional)?;
        let total_fee = fee.checked_add(config.gas_fee)?;
        notional.checked_add(total_fee)?;
        notional.checked_sub(total_fee)?;

        Some(Self {
            total_usd,
            notional,
            fee,
            gas_fee: config.gas_fee,
        })
    }

    pub fn total_fee(&self) -> Decimal {
        self.fee + self.gas_fee
    }

    /// Everything a buy debits from the wallet.
    pub fn buy_cost(&self) -> Decimal {
        self.notional + self.total_fee()
    }

    /// Credit recorded for a sell before the separate fee debits.
    pub fn sell_proceeds(&self) -> Decimal {
        self.notional - self.total_fee()
    }
}

/// Trading fee for a native notional, floored at the minimum fee.
pub fn calculate_fee(config: &LedgerConfig, notional: Decimal) -> Option<Decimal> {
    Some(notional.checked_mul(config.fee_rate)?.max(config.min_fee))
}
