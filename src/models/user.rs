//! The per-user aggregate that owns every wallet, strategy and history record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    BalanceChangeKind, Chain, ChangeRefs, CopyTradeConfig, CopyTradeHistory, TradeHistory,
    Wallet, WalletBalanceChange,
};
use crate::ledger::{LedgerConfig, LedgerError, LedgerResult};

/// A user account, keyed by email.
///
/// Collections are only mutated through crate-internal methods so that
/// balances, totals and the audit log cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub(crate) email: String,

    #[serde(default)]
    pub(crate) wallets: Vec<Wallet>,

    #[serde(default)]
    pub(crate) copy_trades: Vec<CopyTradeConfig>,

    /// Sum of wallet balances
    #[serde(default)]
    pub(crate) total_balance: Decimal,

    /// Sum of wallet USD values
    #[serde(default)]
    pub(crate) total_usd_value: Decimal,

    #[serde(default)]
    pub(crate) trade_history: Vec<TradeHistory>,

    #[serde(default)]
    pub(crate) balance_changes: Vec<WalletBalanceChange>,

    #[serde(default)]
    pub(crate) copy_trade_history: Vec<CopyTradeHistory>,
}

impl User {
    /// Create an empty user with no wallets.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            wallets: Vec::new(),
            copy_trades: Vec::new(),
            total_balance: Decimal::ZERO,
            total_usd_value: Decimal::ZERO,
            trade_history: Vec::new(),
            balance_changes: Vec::new(),
            copy_trade_history: Vec::new(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn copy_trades(&self) -> &[CopyTradeConfig] {
        &self.copy_trades
    }

    pub fn total_balance(&self) -> Decimal {
        self.total_balance
    }

    pub fn total_usd_value(&self) -> Decimal {
        self.total_usd_value
    }

    pub fn trade_history(&self) -> &[TradeHistory] {
        &self.trade_history
    }

    pub fn balance_changes(&self) -> &[WalletBalanceChange] {
        &self.balance_changes
    }

    pub fn copy_trade_history(&self) -> &[CopyTradeHistory] {
        &self.copy_trade_history
    }

    pub fn wallet(&self, wallet_id: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.id == wallet_id)
    }

    pub fn copy_trade(&self, id: &str) -> Option<&CopyTradeConfig> {
        self.copy_trades.iter().find(|c| c.id == id)
    }

    /// Wallet used to settle copy trades.
    pub fn trading_wallet(&self) -> Option<&Wallet> {
        self.wallets.first()
    }

    /// Total native balance held on one chain.
    pub fn chain_balance(&self, chain: Chain) -> Decimal {
        self.wallets
            .iter()
            .filter(|w| w.chain == chain)
            .fold(Decimal::ZERO, |acc, w| acc.saturating_add(w.balance))
    }

    pub(crate) fn copy_trade_mut(&mut self, id: &str) -> Option<&mut CopyTradeConfig> {
        self.copy_trades.iter_mut().find(|c| c.id == id)
    }

    pub(crate) fn history_mut(&mut self, copy_trade_id: &str) -> Option<&mut CopyTradeHistory> {
        self.copy_trade_history
            .iter_mut()
            .find(|h| h.copy_trade_id == copy_trade_id)
    }

    /// Add a wallet. New wallets hold nothing until funded by a balance change.
    pub(crate) fn add_wallet(&mut self, wallet: Wallet, config: &LedgerConfig) -> LedgerResult<&Wallet> {
        self.wallets.push(wallet);
        self.recompute_totals(config)?;
        let last = self.wallets.len() - 1;
        Ok(&self.wallets[last])
    }

    /// Apply a signed amount to a wallet and append the matching audit record.
    ///
    /// Fails with `NotFound` for an unknown wallet and `InvalidAmount` when the
    /// new balance or its USD value does not fit. After an error the aggregate
    /// may be partially updated and must be discarded.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_balance_change(
        &mut self,
        wallet_id: &str,
        kind: BalanceChangeKind,
        amount: Decimal,
        description: impl Into<String>,
        refs: ChangeRefs,
        config: &LedgerConfig,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<WalletBalanceChange> {
        let wallet = self
            .wallets
            .iter_mut()
            .find(|w| w.id == wallet_id)
            .ok_or_else(|| LedgerError::wallet_not_found(wallet_id))?;

        let balance_before = wallet.balance;
        let balance_after = balance_before
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount(amount))?;
        wallet.set_balance(balance_after, config)?;

        let change = WalletBalanceChange {
            id: format!("change-{}", Uuid::new_v4()),
            wallet_id: wallet_id.to_string(),
            kind,
            amount,
            balance_before,
            balance_after,
            timestamp,
            description: description.into(),
            copy_trade_id: refs.copy_trade_id,
            trade_id: refs.trade_id,
        };

        self.recompute_totals(config)?;
        self.balance_changes.push(change.clone());
        Ok(change)
    }

    /// Recompute every wallet's USD value and the user-level totals.
    pub(crate) fn recompute_totals(&mut self, config: &LedgerConfig) -> LedgerResult<()> {
        for wallet in &mut self.wallets {
            wallet.reprice(config)?;
        }
        self.total_balance = checked_sum(self.wallets.iter().map(|w| w.balance))?;
        self.total_usd_value = checked_sum(self.wallets.iter().map(|w| w.usd_value))?;
        Ok(())
    }

    /// Check structural invariants of a loaded aggregate.
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if let Some(bad) = self.balance_changes.iter().find(|c| !c.is_consistent()) {
            anyhow::bail!(
                "balance change {} is inconsistent: {} + {} != {}",
                bad.id,
                bad.balance_before,
                bad.amount,
                bad.balance_after
            );
        }

        for (i, wallet) in self.wallets.iter().enumerate() {
            if self.wallets[..i].iter().any(|w| w.id == wallet.id) {
                anyhow::bail!("duplicate wallet id {}", wallet.id);
            }
        }

        for (i, config) in self.copy_trades.iter().enumerate() {
            if self.copy_trades[..i].iter().any(|c| c.id == config.id) {
                anyhow::bail!("duplicate copy trade id {}", config.id);
            }
        }

        Ok(())
    }
}

fn checked_sum(mut values: impl Iterator<Item = Decimal>) -> LedgerResult<Decimal> {
    values.try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v).ok_or(LedgerError::InvalidAmount(v))
    })
}
