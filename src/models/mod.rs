//! Data model of the ledger: users, wallets, copy trades and their history.

mod chain;
mod copy_trade;
mod history;
mod user;
mod wallet;

use chrono::{DateTime, SubsecRound, Utc};

pub use chain::Chain;
pub use copy_trade::{
    BuyMode, CopyTradeConfig, CopyTradeDraft, CopyTradePatch, CopyTradeStatus, SellMethod,
    TakeProfitTier,
};
pub use history::{
    BalanceChangeKind, ChangeRefs, CopyTradeHistory, TradeHistory, TradeSide, WalletBalanceChange,
};
pub use user::User;
pub use wallet::Wallet;

/// Current time at the millisecond precision records are persisted with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
