//! Pool classification and per-pool configuration.

use crate::domain::{Decimal, PoolAddress, TokenAddress};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Volatility profile of a pool's token pair, driving the base
/// points-per-dollar rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolType {
    StableStable,
    VolatileVolatile,
    VolatileStable,
}

impl PoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::StableStable => "stable_stable",
            PoolType::VolatileVolatile => "volatile_volatile",
            PoolType::VolatileStable => "volatile_stable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stable_stable" => Some(PoolType::StableStable),
            "volatile_volatile" => Some(PoolType::VolatileVolatile),
            "volatile_stable" => Some(PoolType::VolatileStable),
            _ => None,
        }
    }

    /// Classify a pool from its token pair against a stablecoin address set.
    pub fn detect(
        token1: &TokenAddress,
        token2: &TokenAddress,
        stablecoins: &HashSet<TokenAddress>,
    ) -> Self {
        let stable1 = stablecoins.contains(token1);
        let stable2 = stablecoins.contains(token2);
        match (stable1, stable2) {
            (true, true) => PoolType::StableStable,
            (false, false) => PoolType::VolatileVolatile,
            _ => PoolType::VolatileStable,
        }
    }
}

impl std::fmt::Display for PoolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Promotional campaign identity. Eligibility is flagged per pool; activation
/// and start date live in global settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Campaign {
    Bootstrapping,
    EarlySeason,
    MemeSeason,
}

impl Campaign {
    pub const ALL: [Campaign; 3] = [
        Campaign::Bootstrapping,
        Campaign::EarlySeason,
        Campaign::MemeSeason,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Campaign::Bootstrapping => "bootstrapping",
            Campaign::EarlySeason => "early_season",
            Campaign::MemeSeason => "meme_season",
        }
    }
}

impl std::fmt::Display for Campaign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-pool configuration row.
///
/// Created lazily on the first observed event for a pool; the type is derived
/// once and stable thereafter. Eligibility flags and `is_active` are mutated
/// by the admin surface only; the engine reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub pool_address: PoolAddress,
    pub token1: TokenAddress,
    pub token2: TokenAddress,
    pub pool_type: PoolType,
    pub is_active: bool,
    pub bootstrapping_eligible: bool,
    pub early_season_eligible: bool,
    pub meme_season_eligible: bool,
}

impl PoolConfig {
    /// A freshly-detected config: active, not yet flagged for any campaign.
    pub fn new(
        pool_address: PoolAddress,
        token1: TokenAddress,
        token2: TokenAddress,
        pool_type: PoolType,
    ) -> Self {
        PoolConfig {
            pool_address,
            token1,
            token2,
            pool_type,
            is_active: true,
            bootstrapping_eligible: false,
            early_season_eligible: false,
            meme_season_eligible: false,
        }
    }

    pub fn is_eligible(&self, campaign: Campaign) -> bool {
        match campaign {
            Campaign::Bootstrapping => self.bootstrapping_eligible,
            Campaign::EarlySeason => self.early_season_eligible,
            Campaign::MemeSeason => self.meme_season_eligible,
        }
    }
}

/// Reserve state of one pool as reported by the price oracle.
///
/// Reserves are token-denominated (already scaled by the source).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReserves {
    pub address: String,
    pub token1: TokenAddress,
    pub token2: TokenAddress,
    pub reserved1: Decimal,
    pub reserved2: Decimal,
}
