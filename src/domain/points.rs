//! Points ledger rows.

use crate::domain::{Address, Day, Decimal, PoolAddress, PoolType};
use serde::{Deserialize, Serialize};

/// One (user, pool, day) points row.
///
/// Per-pool rows carry the pool's type; the `ALL` summary row aggregates the
/// user's day across pools, and `REFERRAL` rows hold cascade bonuses only.
/// Liquidity points are overwritten on recomputation; swap and referral
/// points accumulate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoints {
    pub user: Address,
    pub pool: PoolAddress,
    pub date: Day,
    pub liquidity_points: Decimal,
    pub swap_points: Decimal,
    pub referral_points: Decimal,
    pub pool_type: Option<PoolType>,
}

impl UserPoints {
    /// An empty row for the given key.
    pub fn empty(user: Address, pool: PoolAddress, date: Day) -> Self {
        UserPoints {
            user,
            pool,
            date,
            liquidity_points: Decimal::zero(),
            swap_points: Decimal::zero(),
            referral_points: Decimal::zero(),
            pool_type: None,
        }
    }

    pub fn total(&self) -> Decimal {
        self.liquidity_points + self.swap_points + self.referral_points
    }
}

/// A referral relationship: `referred` was brought in by `referrer`.
/// At most one referrer per referred user; rows are created externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub referred: Address,
    pub referrer: Address,
}
