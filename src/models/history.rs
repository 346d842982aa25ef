//! Append-only records: executed trades, balance changes, per-strategy summaries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::CopyTradeStatus;

/// Direction of a simulated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "b" => Ok(TradeSide::Buy),
            "sell" | "s" => Ok(TradeSide::Sell),
            other => Err(anyhow::anyhow!("unknown trade side: {}", other)),
        }
    }
}

/// One executed simulated trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeHistory {
    pub id: String,

    /// Owning copy trade
    pub copy_trade_id: String,

    #[serde(rename = "type")]
    pub side: TradeSide,

    /// Token symbol
    pub token: String,

    /// Token amount traded
    pub amount: Decimal,

    /// USD per token
    pub price: Decimal,

    /// `amount * price`
    pub total_usd: Decimal,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    pub source_address: String,

    /// Trading fee in native units
    #[serde(default)]
    pub fee: Decimal,

    /// Gas fee in native units
    #[serde(default)]
    pub gas_fee: Decimal,
}

/// Reason tag on a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceChangeKind {
    CopyTrade,
    Deposit,
    Withdraw,
    Fee,
    Trade,
}

impl BalanceChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CopyTrade => "copytrade",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Fee => "fee",
            Self::Trade => "trade",
        }
    }
}

impl fmt::Display for BalanceChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for BalanceChangeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copytrade" => Ok(Self::CopyTrade),
            "deposit" => Ok(Self::Deposit),
            "withdraw" => Ok(Self::Withdraw),
            "fee" => Ok(Self::Fee),
            "trade" => Ok(Self::Trade),
            other => Err(anyhow::anyhow!("unknown balance change type: {}", other)),
        }
    }
}

/// Audit entry for a single wallet balance mutation.
///
/// Always satisfies `balance_after == balance_before + amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalanceChange {
    pub id: String,

    pub wallet_id: String,

    #[serde(rename = "type")]
    pub kind: BalanceChangeKind,

    /// Signed native amount (positive credits, negative debits)
    pub amount: Decimal,

    pub balance_before: Decimal,

    pub balance_after: Decimal,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_trade_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
}

impl WalletBalanceChange {
    pub fn is_consistent(&self) -> bool {
        self.balance_before.checked_add(self.amount) == Some(self.balance_after)
    }
}

/// Optional back-references attached to a balance change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRefs {
    pub copy_trade_id: Option<String>,
    pub trade_id: Option<String>,
}

impl ChangeRefs {
    pub fn copy_trade(id: impl Into<String>) -> Self {
        Self {
            copy_trade_id: Some(id.into()),
            trade_id: None,
        }
    }

    pub fn with_trade(mut self, id: impl Into<String>) -> Self {
        self.trade_id = Some(id.into());
        self
    }
}

/// Lifetime summary of one copy trade, kept even after the config is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTradeHistory {
    pub id: String,

    pub copy_trade_id: String,

    /// Source name or shortened source address
    pub copy_trade_name: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,

    /// Set on the most recent stop; a later resume keeps it
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,

    /// Native amount spent on buys
    pub total_spent: Decimal,

    /// Trading plus gas fees
    pub total_fees: Decimal,

    pub total_trades: u64,

    pub status: CopyTradeStatus,
}
