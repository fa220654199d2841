//! Daily batch: replay every eligible user's ledgers into balance rows,
//! then award points.
//!
//! The two passes are strictly sequential: every balance row for the day is
//! finalized before any points are computed, so the pool-count multiplier
//! always sees the complete day.

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Address, DailyBalance, Day, Decimal, PoolAddress};
use crate::engine::replay_day;
use crate::orchestration::award::PointsAwarder;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Summary of one daily run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DailyReport {
    pub users: usize,
    pub balance_failures: usize,
    pub points_failures: usize,
}

pub struct DailyCycle {
    repo: Arc<Repository>,
    config: Config,
    awarder: PointsAwarder,
}

impl DailyCycle {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let awarder = PointsAwarder::new(repo.clone(), config.clone());
        Self {
            repo,
            config,
            awarder,
        }
    }

    /// Run both passes for `date`. Per-user failures are logged and
    /// isolated; the rest of the batch proceeds.
    pub async fn run_for(&self, date: Day) -> Result<DailyReport, sqlx::Error> {
        let users = self
            .repo
            .users_for_daily_calculation(date, self.config.min_liquidity_threshold)
            .await?;

        let mut report = DailyReport {
            users: users.len(),
            ..DailyReport::default()
        };
        info!(%date, users = users.len(), "Starting daily liquidity tasks");

        for user in &users {
            if let Err(e) = self.compute_and_store_daily_balances(user, date).await {
                error!(user = %user, %date, error = %e, "Daily balance calculation failed");
                report.balance_failures += 1;
            }
        }
        info!(%date, "Daily balance calculation complete");

        for user in &users {
            if let Err(e) = self.awarder.award_liquidity_points(user, date).await {
                error!(user = %user, %date, error = %e, "Liquidity points award failed");
                report.points_failures += 1;
            }
        }

        if let Err(e) = self.awarder.award_swap_points(date).await {
            error!(%date, error = %e, "Swap points award failed");
            report.points_failures += 1;
        }

        info!(%date, "Daily liquidity tasks completed");
        Ok(report)
    }

    /// Replay one user's day into balance rows.
    ///
    /// Relevant pools are those with a transaction on `date` or a balance
    /// row the previous day. A pool whose day's lowest stays under the
    /// minimum threshold gets no row: the balance is absent, not zero.
    pub async fn compute_and_store_daily_balances(
        &self,
        user: &Address,
        date: Day,
    ) -> Result<(), sqlx::Error> {
        let previous_date = date.previous();

        let transactions = self.repo.query_liquidity_transactions(user, date).await?;
        let previous_balances = self.repo.query_daily_balances(user, previous_date).await?;

        let relevant_pools: BTreeSet<PoolAddress> = transactions
            .iter()
            .map(|t| t.pool.clone())
            .chain(previous_balances.iter().map(|b| b.pool.clone()))
            .collect();

        debug!(
            user = %user,
            %date,
            pools = relevant_pools.len(),
            transactions = transactions.len(),
            "Replaying daily balances"
        );

        for pool in relevant_pools {
            let previous = previous_balances.iter().find(|b| b.pool == pool);
            let previous_final = previous
                .map(|b| b.final_usd)
                .unwrap_or_else(Decimal::zero);

            let pool_transactions: Vec<_> = transactions
                .iter()
                .filter(|t| t.pool == pool)
                .cloned()
                .collect();

            let outcome = replay_day(previous_final, &pool_transactions);

            if outcome.lowest < self.config.min_liquidity_threshold {
                debug!(
                    user = %user,
                    pool = %pool,
                    lowest = %outcome.lowest,
                    "Below minimum threshold; no balance row"
                );
                continue;
            }

            // The streak survives only if yesterday ended above the
            // threshold; otherwise it restarts today.
            let streak_start_date = match previous {
                Some(prev) if prev.final_usd > self.config.min_liquidity_threshold => {
                    prev.streak_start_date
                }
                _ => date,
            };

            let balance = DailyBalance {
                user: user.clone(),
                pool: pool.clone(),
                date,
                lowest_usd: outcome.lowest,
                final_usd: outcome.final_balance,
                streak_start_date,
            };
            self.repo.upsert_daily_balance(&balance).await?;

            debug!(
                user = %user,
                pool = %pool,
                lowest = %outcome.lowest,
                final_balance = %outcome.final_balance,
                streak_start = %streak_start_date,
                "Stored daily balance"
            );
        }

        Ok(())
    }

    /// Purge balance history older than the retention window.
    pub async fn cleanup_old_balances(&self, today: Day) -> Result<u64, sqlx::Error> {
        let cutoff = Day::new(
            today.as_date() - chrono::Duration::days(self.config.retention_days),
        );
        let deleted = self.repo.delete_balances_before(cutoff).await?;
        if deleted > 0 {
            info!(%cutoff, deleted, "Cleaned up old balance rows");
        }
        Ok(deleted)
    }
}
