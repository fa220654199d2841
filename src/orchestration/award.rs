//! Points awarding pipeline: liquidity points, swap points, and the
//! referral cascade.
//!
//! Liquidity points are overwritten per (user, pool, day) so daily re-runs
//! are idempotent; swap and referral points are additive and are never
//! recomputed from scratch.

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Address, Day, Decimal, PoolAddress};
use crate::engine::multiplier::{
    combined_campaign_multiplier, pool_count_multiplier, pool_points,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Swap points below this are rounding noise and are floored to zero.
const SWAP_POINTS_EPSILON: &str = "0.00000001";
const SWAP_POINTS_PRECISION: u32 = 8;

pub struct PointsAwarder {
    repo: Arc<Repository>,
    config: Config,
}

impl PointsAwarder {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self { repo, config }
    }

    /// Award liquidity points to one user for `date` from that day's balance
    /// rows, then cascade referral bonuses. Returns the day total.
    pub async fn award_liquidity_points(
        &self,
        user: &Address,
        date: Day,
    ) -> Result<Decimal, sqlx::Error> {
        let settings = self.repo.get_settings().await?;

        let balances = self.repo.query_daily_balances(user, date).await?;
        let qualifying: Vec<_> = balances
            .into_iter()
            .filter(|b| b.lowest_usd > self.config.min_liquidity_threshold)
            .collect();

        if qualifying.is_empty() {
            debug!(user = %user, %date, "No qualifying balances; no liquidity points");
            return Ok(Decimal::zero());
        }

        let count_multiplier = pool_count_multiplier(qualifying.len());
        let mut total = Decimal::zero();

        for balance in &qualifying {
            let pool_config = match self.repo.get_pool_config(&balance.pool).await? {
                Some(config) if config.is_active => config,
                _ => continue,
            };

            let campaign = combined_campaign_multiplier(
                &self.config.multipliers,
                &settings,
                &pool_config,
                date,
            );
            let points = pool_points(
                &self.config.multipliers,
                balance.lowest_usd,
                pool_config.pool_type,
                balance.streak_start_date,
                campaign,
                date,
            );

            self.repo
                .overwrite_liquidity_points(
                    user,
                    &balance.pool,
                    date,
                    points,
                    Some(pool_config.pool_type),
                )
                .await?;
            total = total + points;
        }

        let day_total = total * count_multiplier;
        self.repo
            .overwrite_liquidity_points(user, &PoolAddress::summary(), date, day_total, None)
            .await?;

        info!(user = %user, %date, points = %day_total, "Awarded liquidity points");

        self.cascade_referral(user, day_total, date).await?;
        Ok(day_total)
    }

    /// Aggregate swap volume per (user, pool) for `date` into fee-based
    /// points and cascade referral bonuses.
    pub async fn award_swap_points(&self, date: Day) -> Result<(), sqlx::Error> {
        let epsilon = Decimal::from_str(SWAP_POINTS_EPSILON).unwrap_or_else(|_| Decimal::zero());
        let volumes = self.repo.swap_volume_by_user_pool(date).await?;

        for (user, pool, volume) in volumes {
            let fee_usd = volume * self.config.swap_fee_rate;
            let points = (fee_usd * self.config.points_per_dollar_fee)
                .round_dp(SWAP_POINTS_PRECISION);
            if points < epsilon {
                continue;
            }

            let pool_type = self
                .repo
                .get_pool_config(&pool)
                .await?
                .map(|config| config.pool_type);

            self.repo
                .add_swap_points(&user, &pool, date, points, pool_type)
                .await?;
            info!(user = %user, pool = %pool, %date, %points, "Awarded swap points");

            self.cascade_referral(&user, points, date).await?;
        }

        Ok(())
    }

    /// Grant referral bonuses on top of an award: a share to the referrer
    /// and an extra share to the referred user. No referrer means no-op.
    pub async fn cascade_referral(
        &self,
        user: &Address,
        points: Decimal,
        date: Day,
    ) -> Result<(), sqlx::Error> {
        if !points.is_positive() {
            return Ok(());
        }

        let referrer = match self.repo.get_referrer(user).await? {
            Some(referrer) => referrer,
            None => return Ok(()),
        };

        let referrer_bonus = points * self.config.referrer_bonus_rate;
        let referee_bonus = points * self.config.referee_bonus_rate;

        self.repo
            .add_referral_points(&referrer, date, referrer_bonus)
            .await?;
        self.repo
            .add_referral_points(user, date, referee_bonus)
            .await?;

        info!(
            user = %user,
            referrer = %referrer,
            %referrer_bonus,
            %referee_bonus,
            "Cascaded referral bonuses"
        );
        Ok(())
    }
}
