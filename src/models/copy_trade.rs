//! Copy-trade strategy configuration and its lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How much to buy when the source wallet buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuyMode {
    /// Mirror the source's size up to the wallet's capacity
    Max,
    /// Fixed native amount per buy (`buy_amount`)
    Fixed,
    /// Percentage of the source's size (`buy_ratio`)
    Ratio,
}

impl FromStr for BuyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "fixed" => Ok(Self::Fixed),
            "ratio" => Ok(Self::Ratio),
            other => Err(anyhow::anyhow!("unknown buy mode: {}", other)),
        }
    }
}

/// Exit rule for positions opened by a copy trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellMethod {
    /// Sell when the source sells
    Copy,
    /// Never sell automatically
    NoSell,
    /// Take-profit / stop-loss percentages
    Tpsl,
    /// Tiered take-profit ladder (`advanced_strategy`)
    Adv,
}

impl FromStr for SellMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "nosell" | "no_sell" => Ok(Self::NoSell),
            "tpsl" => Ok(Self::Tpsl),
            "adv" | "advanced" => Ok(Self::Adv),
            other => Err(anyhow::anyhow!("unknown sell method: {}", other)),
        }
    }
}

/// Running state of a copy trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyTradeStatus {
    Running,
    Paused,
    Stopped,
}

impl CopyTradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    /// Initial status for a freshly created config.
    pub fn initial(enabled: bool) -> Self {
        if enabled {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

impl fmt::Display for CopyTradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One rung of an advanced take-profit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitTier {
    /// Profit percentage that triggers the rung
    pub tp: Decimal,
    /// Percentage of the position to sell
    pub sell: Decimal,
}

/// User-authored fields of a copy trade, before the ledger assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTradeDraft {
    /// Wallet being mirrored
    pub source_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    pub buy_mode: BuyMode,
    /// Native amount per buy (fixed mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_amount: Option<Decimal>,
    /// Percentage of the source's size (ratio mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_ratio: Option<Decimal>,

    pub sell_method: SellMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_percent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sl_percent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advanced_strategy: Vec<TakeProfitTier>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<Decimal>,

    pub enabled: bool,
}

impl CopyTradeDraft {
    /// Minimal draft: ratio sizing, copy exits, enabled.
    pub fn new(source_address: impl Into<String>) -> Self {
        Self {
            source_address: source_address.into(),
            source_name: None,
            buy_mode: BuyMode::Ratio,
            buy_amount: None,
            buy_ratio: None,
            sell_method: SellMethod::Copy,
            tp_percent: None,
            sl_percent: None,
            advanced_strategy: Vec::new(),
            slippage: None,
            gas_limit: None,
            enabled: true,
        }
    }
}

/// A copy-trade strategy owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTradeConfig {
    pub id: String,

    #[serde(flatten)]
    pub settings: CopyTradeDraft,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    /// Token amount bought so far
    #[serde(default)]
    pub bought: Decimal,

    /// Token amount sold so far
    #[serde(default)]
    pub sold: Decimal,

    pub status: CopyTradeStatus,
}

impl CopyTradeConfig {
    pub fn source_address(&self) -> &str {
        &self.settings.source_address
    }

    /// Source name, or the first 8 characters of the address.
    pub fn display_name(&self) -> String {
        match &self.settings.source_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => {
                let addr = &self.settings.source_address;
                let prefix: String = addr.chars().take(8).collect();
                format!("{}...", prefix)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == CopyTradeStatus::Running
    }
}

/// Partial update for a copy trade. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTradePatch {
    pub source_name: Option<String>,
    pub buy_mode: Option<BuyMode>,
    pub buy_amount: Option<Decimal>,
    pub buy_ratio: Option<Decimal>,
    pub sell_method: Option<SellMethod>,
    pub tp_percent: Option<Decimal>,
    pub sl_percent: Option<Decimal>,
    pub advanced_strategy: Option<Vec<TakeProfitTier>>,
    pub slippage: Option<Decimal>,
    pub gas_limit: Option<Decimal>,
    pub enabled: Option<bool>,
    pub status: Option<CopyTradeStatus>,
}

impl CopyTradePatch {
    pub fn status(status: CopyTradeStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Merge the plain settings fields. Status is handled by the ledger.
    pub(crate) fn merge_settings(&self, settings: &mut CopyTradeDraft) {
        if let Some(v) = &self.source_name {
            settings.source_name = Some(v.clone());
        }
        if let Some(v) = self.buy_mode {
            settings.buy_mode = v;
        }
        if let Some(v) = self.buy_amount {
            settings.buy_amount = Some(v);
        }
        if let Some(v) = self.buy_ratio {
            settings.buy_ratio = Some(v);
        }
        if let Some(v) = self.sell_method {
            settings.sell_method = v;
        }
        if let Some(v) = self.tp_percent {
            settings.tp_percent = Some(v);
        }
        if let Some(v) = self.sl_percent {
            settings.sl_percent = Some(v);
        }
        if let Some(v) = &self.advanced_strategy {
            settings.advanced_strategy = v.clone();
        }
        if let Some(v) = self.slippage {
            settings.slippage = Some(v);
        }
        if let Some(v) = self.gas_limit {
            settings.gas_limit = Some(v);
        }
        if let Some(v) = self.enabled {
            settings.enabled = v;
        }
    }
}
