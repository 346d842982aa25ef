//! Copy-trade ledger: sessions, fees, balance bookkeeping and queries.

mod config;
mod engine;
mod error;
mod fees;
mod session;
mod summary;

#[cfg(test)]
mod tests;

pub use config::LedgerConfig;
pub use engine::CopyTradeLedger;
pub use error::{LedgerError, LedgerResult};
pub use fees::{calculate_fee, TradeCosts};
pub use session::Session;
pub use summary::PortfolioSummary;
