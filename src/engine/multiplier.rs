//! Multiplier composition for daily liquidity points.
//!
//! All functions here are pure reads over persisted state. Per-pool points
//! compose as `lowest_usd x pool-type rate x duration x campaign`; the
//! pool-count multiplier applies once per user-day on the summed total.

use crate::domain::{Campaign, CampaignState, Day, Decimal, GlobalSettings, PoolConfig, PoolType};
use rust_decimal::Decimal as RustDecimal;

/// Externally-configured multiplier tiers and campaign durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplierConfig {
    pub stable_stable_rate: Decimal,
    pub volatile_volatile_rate: Decimal,
    pub volatile_stable_rate: Decimal,

    pub duration_days_1_5x: i64,
    pub duration_days_2x: i64,
    pub duration_days_3x: i64,
    pub duration_days_4x: i64,
    pub duration_days_5x: i64,

    pub bootstrapping_duration_days: i64,
    pub early_season_duration_days: i64,
    pub meme_season_duration_days: i64,
}

impl Default for MultiplierConfig {
    fn default() -> Self {
        MultiplierConfig {
            stable_stable_rate: Decimal::new(RustDecimal::new(25, 1)),
            volatile_volatile_rate: Decimal::from_i64(5),
            volatile_stable_rate: Decimal::from_i64(10),
            duration_days_1_5x: 7,
            duration_days_2x: 15,
            duration_days_3x: 30,
            duration_days_4x: 60,
            duration_days_5x: 90,
            bootstrapping_duration_days: 14,
            early_season_duration_days: 28,
            meme_season_duration_days: 14,
        }
    }
}

impl MultiplierConfig {
    /// Base points-per-dollar rate for a pool type.
    pub fn pool_type_rate(&self, pool_type: PoolType) -> Decimal {
        match pool_type {
            PoolType::StableStable => self.stable_stable_rate,
            PoolType::VolatileVolatile => self.volatile_volatile_rate,
            PoolType::VolatileStable => self.volatile_stable_rate,
        }
    }

    fn campaign_duration_days(&self, campaign: Campaign) -> i64 {
        match campaign {
            Campaign::Bootstrapping => self.bootstrapping_duration_days,
            Campaign::EarlySeason => self.early_season_duration_days,
            Campaign::MemeSeason => self.meme_season_duration_days,
        }
    }
}

/// Stepped duration multiplier over whole days since the streak started.
///
/// Non-decreasing, left-closed intervals, no interpolation.
pub fn duration_multiplier(config: &MultiplierConfig, streak_start: Day, date: Day) -> Decimal {
    let days_held = date.days_since(streak_start);
    if days_held >= config.duration_days_5x {
        Decimal::from_i64(5)
    } else if days_held >= config.duration_days_4x {
        Decimal::from_i64(4)
    } else if days_held >= config.duration_days_3x {
        Decimal::from_i64(3)
    } else if days_held >= config.duration_days_2x {
        Decimal::from_i64(2)
    } else if days_held >= config.duration_days_1_5x {
        Decimal::new(RustDecimal::new(15, 1))
    } else {
        Decimal::one()
    }
}

/// Linearly-decaying multiplier for one campaign.
///
/// 5x at the campaign start, decaying to a 1x floor once the configured
/// duration has elapsed. Inactive campaigns and ineligible pools are 1x.
/// An active campaign without a recorded start date decays from `date`
/// itself, i.e. contributes the full 5x.
pub fn campaign_multiplier(
    config: &MultiplierConfig,
    campaign: Campaign,
    state: CampaignState,
    eligible: bool,
    date: Day,
) -> Decimal {
    if !state.is_active || !eligible {
        return Decimal::one();
    }

    let start = state.start_date.unwrap_or(date);
    let elapsed = date.days_since(start).max(0);
    let duration = config.campaign_duration_days(campaign).max(1);

    let five = Decimal::from_i64(5);
    let four = Decimal::from_i64(4);
    let decayed =
        five - four * Decimal::from_i64(elapsed) / Decimal::from_i64(duration);
    decayed.max(Decimal::one())
}

/// Product of all campaign multipliers applicable to a pool on `date`.
pub fn combined_campaign_multiplier(
    config: &MultiplierConfig,
    settings: &GlobalSettings,
    pool: &PoolConfig,
    date: Day,
) -> Decimal {
    Campaign::ALL.iter().fold(Decimal::one(), |acc, &campaign| {
        acc * campaign_multiplier(
            config,
            campaign,
            settings.campaign(campaign),
            pool.is_eligible(campaign),
            date,
        )
    })
}

/// Cross-pool multiplier: the number of pools holding a qualifying balance
/// that day, capped at 4. Applied once per user-day.
pub fn pool_count_multiplier(pool_count: usize) -> Decimal {
    Decimal::from_i64(pool_count.min(4) as i64)
}

/// Points earned by one pool's balance on `date`.
pub fn pool_points(
    config: &MultiplierConfig,
    lowest_usd: Decimal,
    pool_type: PoolType,
    streak_start: Day,
    campaign: Decimal,
    date: Day,
) -> Decimal {
    lowest_usd
        * config.pool_type_rate(pool_type)
        * duration_multiplier(config, streak_start, date)
        * campaign
}
