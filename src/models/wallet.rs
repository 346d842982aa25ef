//! Simulated wallet balance bucket.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Chain;
use crate::ledger::{LedgerConfig, LedgerError, LedgerResult};

/// One simulated balance bucket owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,

    /// Display name (e.g. "Wallet1")
    pub name: String,

    /// Display address, not a real key
    pub address: String,

    /// Balance in native units (SOL or equivalent)
    pub balance: Decimal,

    /// `balance * reference_price`
    #[serde(default)]
    pub usd_value: Decimal,

    #[serde(default)]
    pub chain: Chain,
}

impl Wallet {
    /// Create an empty wallet. Funds only arrive through the ledger.
    pub fn new(name: impl Into<String>, address: impl Into<String>, chain: Chain) -> Self {
        Self {
            id: format!("wallet-{}", Uuid::new_v4()),
            name: name.into(),
            address: address.into(),
            balance: Decimal::ZERO,
            usd_value: Decimal::ZERO,
            chain,
        }
    }

    /// Generate a shortened placeholder address like `0x1a2b3c4d...9f8e`.
    pub fn placeholder_address() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("0x{}...{}", &hex[..8], &hex[hex.len() - 4..])
    }

    /// Set the balance and keep the USD value in step with it.
    ///
    /// Fails without modifying the wallet when the USD value does not fit.
    pub(crate) fn set_balance(&mut self, balance: Decimal, config: &LedgerConfig) -> LedgerResult<()> {
        let usd_value = config
            .to_usd(balance)
            .ok_or(LedgerError::InvalidAmount(balance))?;
        self.balance = balance;
        self.usd_value = usd_value;
        Ok(())
    }

    pub(crate) fn reprice(&mut self, config: &LedgerConfig) -> LedgerResult<()> {
        self.set_balance(self.balance, config)
    }
}
