//! Daily balance rows produced by the replay engine.

use crate::domain::{Address, Day, Decimal, PoolAddress};
use serde::{Deserialize, Serialize};

/// One (user, pool, day) balance row.
///
/// `lowest_usd` is the day's minimum running balance and is what points are
/// computed from; `final_usd` seeds the next day's replay. `streak_start_date`
/// marks the first day of the current above-threshold run and drives the
/// duration multiplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBalance {
    pub user: Address,
    pub pool: PoolAddress,
    pub date: Day,
    pub lowest_usd: Decimal,
    pub final_usd: Decimal,
    pub streak_start_date: Day,
}

impl DailyBalance {
    /// Whole days the streak has been running as of this row's date.
    pub fn streak_days(&self) -> i64 {
        self.date.days_since(self.streak_start_date)
    }
}
