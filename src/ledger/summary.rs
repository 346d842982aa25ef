//! Portfolio-level roll-up of a user's ledger.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{CopyTradeHistory, CopyTradeStatus, User};

/// Read-only snapshot of balances and copy-trade activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioSummary {
    pub email: String,
    pub total_balance: Decimal,
    pub total_usd_value: Decimal,
    pub wallets: usize,
    pub running: usize,
    pub paused: usize,
    pub stopped: usize,
    /// Native amount spent on buys across all copy trades, deleted ones included
    pub total_spent: Decimal,
    pub total_fees: Decimal,
    pub total_trades: u64,
}

impl PortfolioSummary {
    pub fn from_user(user: &User) -> Self {
        let count = |status: CopyTradeStatus| {
            user.copy_trades()
                .iter()
                .filter(|c| c.status == status)
                .count()
        };

        let history = user.copy_trade_history();
        let total = |field: fn(&CopyTradeHistory) -> Decimal| {
            history
                .iter()
                .fold(Decimal::ZERO, |acc, h| acc.saturating_add(field(h)))
        };

        Self {
            email: user.email().to_string(),
            total_balance: user.total_balance(),
            total_usd_value: user.total_usd_value(),
            wallets: user.wallets().len(),
            running: count(CopyTradeStatus::Running),
            paused: count(CopyTradeStatus::Paused),
            stopped: count(CopyTradeStatus::Stopped),
            total_spent: total(|h| h.total_spent),
            total_fees: total(|h| h.total_fees),
            total_trades: history
                .iter()
                .fold(0, |acc: u64, h| acc.saturating_add(h.total_trades)),
        }
    }

    /// Fees as a share of spend, zero when nothing was spent.
    pub fn fee_ratio(&self) -> Decimal {
        self.total_fees
            .checked_div(self.total_spent)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for PortfolioSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^50}", " PORTFOLIO ")?;
        writeln!(f, "Account:          {}", self.email)?;
        writeln!(f)?;
        writeln!(f, "Total Balance:    {:.4} SOL", self.total_balance)?;
        writeln!(f, "Total Value:      ${:.2}", self.total_usd_value)?;
        writeln!(f, "Wallets:          {}", self.wallets)?;
        writeln!(f)?;
        writeln!(
            f,
            "Copy Trades:      {} running / {} paused / {} stopped",
            self.running, self.paused, self.stopped
        )?;
        writeln!(f, "Total Spent:      {:.4} SOL", self.total_spent)?;
        writeln!(
            f,
            "Total Fees:       {:.4} SOL ({:.2}% of spend)",
            self.total_fees,
            self.fee_ratio().saturating_mul(dec!(100))
        )?;
        writeln!(f, "Total Trades:     {}", self.total_trades)?;
        writeln!(f, "{:=^50}", "")?;
        Ok(())
    }
}
