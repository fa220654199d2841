//! Append-only ledger rows: liquidity (mint/burn) and swap transactions.

use crate::domain::{Address, Day, Decimal, PoolAddress, TimeMs, TokenAddress};
use serde::{Deserialize, Serialize};

/// Direction of a liquidity transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityTxKind {
    /// Liquidity added; increases the running balance.
    Mint,
    /// Liquidity removed; decreases the running balance.
    Burn,
}

impl LiquidityTxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiquidityTxKind::Mint => "mint",
            LiquidityTxKind::Burn => "burn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mint" => Some(LiquidityTxKind::Mint),
            "burn" => Some(LiquidityTxKind::Burn),
            _ => None,
        }
    }
}

impl std::fmt::Display for LiquidityTxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mint or burn recorded against a user's pool ledger.
///
/// `created_at` gives deterministic ordering for same-day transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityTransaction {
    pub user: Address,
    pub pool: PoolAddress,
    pub kind: LiquidityTxKind,
    pub value_usd: Decimal,
    pub date: Day,
    pub created_at: TimeMs,
}

/// A swap recorded for fee-based points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTransaction {
    pub user: Address,
    pub pool: PoolAddress,
    pub token_in: TokenAddress,
    pub token_out: TokenAddress,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    /// Average USD value of the two legs, clamped to the safety ceiling.
    pub value_usd: Decimal,
    pub date: Day,
    pub created_at: TimeMs,
}
