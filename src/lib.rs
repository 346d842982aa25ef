//! Simulated copy-trade ledger.
//!
//! Tracks per-user wallet balances, copy-trade strategies and their
//! lifecycle, fee-bearing simulated trades, and an append-only audit log of
//! every balance mutation. State is persisted per user through a
//! [`db::UserStore`].

pub mod db;
pub mod ledger;
pub mod models;

pub use db::{MemoryStore, SqliteStore, UserStore};
pub use ledger::{
    calculate_fee, CopyTradeLedger, LedgerConfig, LedgerError, LedgerResult, PortfolioSummary,
    Session, TradeCosts,
};
