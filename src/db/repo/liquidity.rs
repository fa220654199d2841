//! Pool config, liquidity transaction, and daily balance operations.

use crate::domain::{
    Address, DailyBalance, Day, Decimal, LiquidityTransaction, LiquidityTxKind, PoolAddress,
    PoolConfig, PoolType, TimeMs, TokenAddress,
};
use sqlx::Row;
use std::collections::BTreeSet;
use tracing::warn;

use super::{parse_stored_decimal, Repository};

impl Repository {
    // =========================================================================
    // Pool configs
    // =========================================================================

    pub async fn get_pool_config(
        &self,
        pool: &PoolAddress,
    ) -> Result<Option<PoolConfig>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT pool_address, token1, token2, pool_type, is_active,
                   bootstrapping_eligible, early_season_eligible, meme_season_eligible
            FROM pool_configs
            WHERE pool_address = ?
            "#,
        )
        .bind(pool.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| row_to_pool_config(&r)))
    }

    /// Insert a pool config unless one already exists.
    ///
    /// The type is derived once at first sight of a pool and stable
    /// thereafter; a concurrent insert simply loses and keeps the original.
    pub async fn insert_pool_config_if_absent(
        &self,
        config: &PoolConfig,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO pool_configs (
                pool_address, token1, token2, pool_type, is_active,
                bootstrapping_eligible, early_season_eligible, meme_season_eligible,
                created_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(pool_address) DO NOTHING
            "#,
        )
        .bind(config.pool_address.as_str())
        .bind(config.token1.as_str())
        .bind(config.token2.as_str())
        .bind(config.pool_type.as_str())
        .bind(config.is_active as i64)
        .bind(config.bootstrapping_eligible as i64)
        .bind(config.early_season_eligible as i64)
        .bind(config.meme_season_eligible as i64)
        .bind(TimeMs::now().as_i64())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a pool config row. Used by tests and the admin surface to
    /// flip eligibility or activity flags.
    pub async fn update_pool_config(&self, config: &PoolConfig) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE pool_configs SET
                is_active = ?,
                bootstrapping_eligible = ?,
                early_season_eligible = ?,
                meme_season_eligible = ?
            WHERE pool_address = ?
            "#,
        )
        .bind(config.is_active as i64)
        .bind(config.bootstrapping_eligible as i64)
        .bind(config.early_season_eligible as i64)
        .bind(config.meme_season_eligible as i64)
        .bind(config.pool_address.as_str())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    // =========================================================================
    // Liquidity transactions
    // =========================================================================

    /// Append a mint/burn to the ledger.
    pub async fn insert_liquidity_transaction(
        &self,
        tx: &LiquidityTransaction,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO liquidity_transactions (user, pool, kind, value_usd, date, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tx.user.as_str())
        .bind(tx.pool.as_str())
        .bind(tx.kind.as_str())
        .bind(tx.value_usd.to_canonical_string())
        .bind(tx.date.to_string())
        .bind(tx.created_at.as_i64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// All of a user's liquidity transactions on one day, in deterministic
    /// replay order (creation time, then insertion order).
    pub async fn query_liquidity_transactions(
        &self,
        user: &Address,
        date: Day,
    ) -> Result<Vec<LiquidityTransaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user, pool, kind, value_usd, date, created_at_ms
            FROM liquidity_transactions
            WHERE user = ? AND date = ?
            ORDER BY created_at_ms ASC, id ASC
            "#,
        )
        .bind(user.as_str())
        .bind(date.to_string())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_liquidity_tx).collect())
    }

    // =========================================================================
    // Daily balances
    // =========================================================================

    /// Upsert one (user, pool, day) balance row. Overwrite semantics keep
    /// the daily recomputation idempotent.
    pub async fn upsert_daily_balance(&self, balance: &DailyBalance) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO daily_balances (user, pool, date, lowest_usd, final_usd, streak_start_date)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user, pool, date) DO UPDATE SET
                lowest_usd = excluded.lowest_usd,
                final_usd = excluded.final_usd,
                streak_start_date = excluded.streak_start_date
            "#,
        )
        .bind(balance.user.as_str())
        .bind(balance.pool.as_str())
        .bind(balance.date.to_string())
        .bind(balance.lowest_usd.to_canonical_string())
        .bind(balance.final_usd.to_canonical_string())
        .bind(balance.streak_start_date.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_daily_balance(
        &self,
        user: &Address,
        pool: &PoolAddress,
        date: Day,
    ) -> Result<Option<DailyBalance>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT user, pool, date, lowest_usd, final_usd, streak_start_date
            FROM daily_balances
            WHERE user = ? AND pool = ? AND date = ?
            "#,
        )
        .bind(user.as_str())
        .bind(pool.as_str())
        .bind(date.to_string())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| row_to_daily_balance(&r)))
    }

    /// All balance rows for one user on one day.
    pub async fn query_daily_balances(
        &self,
        user: &Address,
        date: Day,
    ) -> Result<Vec<DailyBalance>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user, pool, date, lowest_usd, final_usd, streak_start_date
            FROM daily_balances
            WHERE user = ? AND date = ?
            ORDER BY pool ASC
            "#,
        )
        .bind(user.as_str())
        .bind(date.to_string())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_daily_balance).collect())
    }

    /// Users needing daily processing for `date`: anyone with a transaction
    /// that day, plus anyone carrying a prior-day balance above `threshold`.
    pub async fn users_for_daily_calculation(
        &self,
        date: Day,
        threshold: Decimal,
    ) -> Result<Vec<Address>, sqlx::Error> {
        let mut users: BTreeSet<String> = BTreeSet::new();

        let tx_rows = sqlx::query(
            "SELECT DISTINCT user FROM liquidity_transactions WHERE date = ?",
        )
        .bind(date.to_string())
        .fetch_all(self.pool())
        .await?;
        for row in tx_rows {
            users.insert(row.get::<String, _>("user"));
        }

        // Threshold comparison happens in Rust: balances are stored as text.
        let balance_rows = sqlx::query("SELECT user, lowest_usd FROM daily_balances WHERE date = ?")
            .bind(date.previous().to_string())
            .fetch_all(self.pool())
            .await?;
        for row in balance_rows {
            let lowest =
                parse_stored_decimal(&row.get::<String, _>("lowest_usd"), "balance lowest_usd");
            if lowest > threshold {
                users.insert(row.get::<String, _>("user"));
            }
        }

        Ok(users.into_iter().map(Address::new).collect())
    }

    /// Purge balance rows older than `cutoff`. Returns rows deleted.
    pub async fn delete_balances_before(&self, cutoff: Day) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM daily_balances WHERE date < ?")
            .bind(cutoff.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_pool_config(row: &sqlx::sqlite::SqliteRow) -> PoolConfig {
    let pool_type_str: String = row.get("pool_type");
    let pool_type = PoolType::parse(&pool_type_str).unwrap_or_else(|| {
        warn!(pool_type = %pool_type_str, "Unknown stored pool type, defaulting to volatile_stable");
        PoolType::VolatileStable
    });

    PoolConfig {
        pool_address: PoolAddress::new(row.get::<String, _>("pool_address")),
        token1: TokenAddress::new(row.get::<String, _>("token1")),
        token2: TokenAddress::new(row.get::<String, _>("token2")),
        pool_type,
        is_active: row.get::<i64, _>("is_active") != 0,
        bootstrapping_eligible: row.get::<i64, _>("bootstrapping_eligible") != 0,
        early_season_eligible: row.get::<i64, _>("early_season_eligible") != 0,
        meme_season_eligible: row.get::<i64, _>("meme_season_eligible") != 0,
    }
}

fn row_to_liquidity_tx(row: &sqlx::sqlite::SqliteRow) -> LiquidityTransaction {
    let kind_str: String = row.get("kind");
    let date_str: String = row.get("date");
    LiquidityTransaction {
        user: Address::new(row.get::<String, _>("user")),
        pool: PoolAddress::new(row.get::<String, _>("pool")),
        kind: LiquidityTxKind::parse(&kind_str).unwrap_or_else(|| {
            warn!(kind = %kind_str, "Unknown stored transaction kind, defaulting to mint");
            LiquidityTxKind::Mint
        }),
        value_usd: parse_stored_decimal(&row.get::<String, _>("value_usd"), "liquidity value_usd"),
        date: Day::parse(&date_str).unwrap_or_else(Day::today),
        created_at: TimeMs::new(row.get::<i64, _>("created_at_ms")),
    }
}

fn row_to_daily_balance(row: &sqlx::sqlite::SqliteRow) -> DailyBalance {
    let date_str: String = row.get("date");
    let streak_str: String = row.get("streak_start_date");
    let date = Day::parse(&date_str).unwrap_or_else(Day::today);
    DailyBalance {
        user: Address::new(row.get::<String, _>("user")),
        pool: PoolAddress::new(row.get::<String, _>("pool")),
        date,
        lowest_usd: parse_stored_decimal(&row.get::<String, _>("lowest_usd"), "balance lowest_usd"),
        final_usd: parse_stored_decimal(&row.get::<String, _>("final_usd"), "balance final_usd"),
        streak_start_date: Day::parse(&streak_str).unwrap_or(date),
    }
}
