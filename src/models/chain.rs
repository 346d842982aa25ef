//! Supported networks a wallet can live on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Network a simulated wallet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Chain {
    #[default]
    #[serde(rename = "SOL")]
    Sol,
    #[serde(rename = "BSC")]
    Bsc,
    Base,
    Monad,
    #[serde(rename = "ETH")]
    Eth,
    Tron,
}

impl Chain {
    /// Short ticker-style code, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Sol => "SOL",
            Chain::Bsc => "BSC",
            Chain::Base => "Base",
            Chain::Monad => "Monad",
            Chain::Eth => "ETH",
            Chain::Tron => "Tron",
        }
    }

    /// Human-readable network name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Sol => "Solana",
            Chain::Bsc => "Binance Smart Chain",
            Chain::Base => "Base",
            Chain::Monad => "Monad",
            Chain::Eth => "Ethereum",
            Chain::Tron => "Tron",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sol" | "solana" => Ok(Chain::Sol),
            "bsc" | "bnb" => Ok(Chain::Bsc),
            "base" => Ok(Chain::Base),
            "monad" => Ok(Chain::Monad),
            "eth" | "ethereum" => Ok(Chain::Eth),
            "tron" | "trx" => Ok(Chain::Tron),
            other => Err(anyhow::anyhow!("unknown chain: {}", other)),
        }
    }
}
