use rust_decimal::Decimal;

use crate::models::CopyTradeStatus;

/// Failure of a ledger operation. A failed mutation leaves stored state untouched.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Copy trade {id} is {status}, not running")]
    ConfigNotRunning { id: String, status: CopyTradeStatus },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Persistence error: {0:#}")]
    Persistence(anyhow::Error),
}

impl LedgerError {
    pub(crate) fn wallet_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Wallet",
            id: id.into(),
        }
    }

    pub(crate) fn config_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "CopyTrade",
            id: id.into(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
