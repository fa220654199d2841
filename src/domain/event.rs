//! Pool lifecycle events as delivered by the event source.

use crate::domain::{Decimal, PoolAddress, TokenAddress};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Event kind on a liquidity pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Swap,
    Mint,
    Burn,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Swap => write!(f, "Swap"),
            EventKind::Mint => write!(f, "Mint"),
            EventKind::Burn => write!(f, "Burn"),
        }
    }
}

/// Pool reference carried on every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRef {
    /// Pool contract address, when the source knows it.
    pub id: Option<String>,
    pub token1: TokenAddress,
    pub token2: TokenAddress,
}

impl PoolRef {
    /// Canonical pool address for ledger rows.
    ///
    /// Prefers the explicit pool id, falls back to a `token1_token2` key,
    /// and finally to `unknown` when even the token pair is unusable.
    pub fn canonical_address(&self) -> PoolAddress {
        if let Some(id) = &self.id {
            if !id.is_empty() {
                return PoolAddress::new(id.clone());
            }
        }
        if !self.token1.as_str().is_empty() && !self.token2.as_str().is_empty() {
            return PoolAddress::new(format!("{}_{}", self.token1, self.token2));
        }
        PoolAddress::new("unknown".to_string())
    }
}

/// A single pool event from the block-ordered feed.
///
/// Amounts arrive as base-unit integer strings scaled by 10^18; use
/// [`PoolEvent::amount1_tokens`] / [`PoolEvent::amount2_tokens`] to obtain
/// token-denominated values. Burn events report withdrawn amounts with a
/// negative sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEvent {
    /// Source-assigned event id; the dedup key when present.
    pub id: String,
    pub block_height: i64,
    pub kind: EventKind,
    pub to_address: Option<String>,
    pub sender_address: Option<String>,
    pub signer_address: Option<String>,
    /// Raw base-unit amount of token1.
    pub amount1: String,
    /// Raw base-unit amount of token2.
    pub amount2: String,
    pub pool: PoolRef,
}

const BASE_UNIT_SCALE: &str = "1000000000000000000";

fn parse_base_units(raw: &str) -> Option<Decimal> {
    let value = Decimal::from_str(raw).ok()?;
    let scale = Decimal::from_str(BASE_UNIT_SCALE).ok()?;
    Some(value / scale)
}

impl PoolEvent {
    /// Token-denominated amount of token1, or None when unparseable.
    pub fn amount1_tokens(&self) -> Option<Decimal> {
        parse_base_units(&self.amount1)
    }

    /// Token-denominated amount of token2, or None when unparseable.
    pub fn amount2_tokens(&self) -> Option<Decimal> {
        parse_base_units(&self.amount2)
    }

    /// Stable unique key for deduplication.
    ///
    /// Priority: source id (if present) > hash of deterministic fields.
    pub fn event_key(&self) -> String {
        if !self.id.is_empty() {
            return self.id.clone();
        }

        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.block_height.to_le_bytes());
        hasher.update(self.kind.to_string());
        hasher.update(self.to_address.as_deref().unwrap_or(""));
        hasher.update(self.sender_address.as_deref().unwrap_or(""));
        hasher.update(&self.amount1);
        hasher.update(&self.amount2);
        hasher.update(self.pool.token1.as_str());
        hasher.update(self.pool.token2.as_str());
        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }
}
