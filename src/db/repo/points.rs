//! Points rows, referral relationships, and global settings.

use crate::domain::{
    Address, CampaignState, Day, Decimal, GlobalSettings, PoolAddress, PoolType, Referral, TimeMs,
    UserPoints,
};
use sqlx::Row;

use super::{parse_stored_decimal, Repository};

impl Repository {
    // =========================================================================
    // Points rows
    // =========================================================================

    pub async fn get_user_points(
        &self,
        user: &Address,
        pool: &PoolAddress,
        date: Day,
    ) -> Result<Option<UserPoints>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT user, pool, date, liquidity_points, swap_points, referral_points, pool_type
            FROM user_points
            WHERE user = ? AND pool = ? AND date = ?
            "#,
        )
        .bind(user.as_str())
        .bind(pool.as_str())
        .bind(date.to_string())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| row_to_user_points(&r)))
    }

    /// All points rows for one user on one day (per-pool, summary, referral).
    pub async fn query_user_points(
        &self,
        user: &Address,
        date: Day,
    ) -> Result<Vec<UserPoints>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user, pool, date, liquidity_points, swap_points, referral_points, pool_type
            FROM user_points
            WHERE user = ? AND date = ?
            ORDER BY pool ASC
            "#,
        )
        .bind(user.as_str())
        .bind(date.to_string())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_user_points).collect())
    }

    /// Overwrite the liquidity points of one row, leaving the additive
    /// buckets untouched. Daily recomputation must be idempotent.
    pub async fn overwrite_liquidity_points(
        &self,
        user: &Address,
        pool: &PoolAddress,
        date: Day,
        points: Decimal,
        pool_type: Option<PoolType>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_points (user, pool, date, liquidity_points, pool_type)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user, pool, date) DO UPDATE SET
                liquidity_points = excluded.liquidity_points,
                pool_type = excluded.pool_type
            "#,
        )
        .bind(user.as_str())
        .bind(pool.as_str())
        .bind(date.to_string())
        .bind(points.to_canonical_string())
        .bind(pool_type.map(|pt| pt.as_str()))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Add swap points to one row. Read-modify-write keeps decimal math in
    /// Rust; the swap bucket accumulates across batch runs.
    pub async fn add_swap_points(
        &self,
        user: &Address,
        pool: &PoolAddress,
        date: Day,
        points: Decimal,
        pool_type: Option<PoolType>,
    ) -> Result<(), sqlx::Error> {
        let existing = self.get_user_points(user, pool, date).await?;
        let current = existing
            .as_ref()
            .map(|p| p.swap_points)
            .unwrap_or_else(Decimal::zero);
        let updated = current + points;

        sqlx::query(
            r#"
            INSERT INTO user_points (user, pool, date, swap_points, pool_type)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user, pool, date) DO UPDATE SET
                swap_points = excluded.swap_points,
                pool_type = COALESCE(excluded.pool_type, user_points.pool_type)
            "#,
        )
        .bind(user.as_str())
        .bind(pool.as_str())
        .bind(date.to_string())
        .bind(updated.to_canonical_string())
        .bind(pool_type.map(|pt| pt.as_str()))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Add referral points to the user's reserved referral row for the day.
    pub async fn add_referral_points(
        &self,
        user: &Address,
        date: Day,
        points: Decimal,
    ) -> Result<(), sqlx::Error> {
        let pool = PoolAddress::referral();
        let existing = self.get_user_points(user, &pool, date).await?;
        let current = existing
            .as_ref()
            .map(|p| p.referral_points)
            .unwrap_or_else(Decimal::zero);
        let updated = current + points;

        sqlx::query(
            r#"
            INSERT INTO user_points (user, pool, date, referral_points)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user, pool, date) DO UPDATE SET
                referral_points = excluded.referral_points
            "#,
        )
        .bind(user.as_str())
        .bind(pool.as_str())
        .bind(date.to_string())
        .bind(updated.to_canonical_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    // =========================================================================
    // Referral relationships
    // =========================================================================

    /// The referrer of a user, when one is recorded.
    pub async fn get_referrer(&self, user: &Address) -> Result<Option<Address>, sqlx::Error> {
        let row = sqlx::query("SELECT referrer FROM referrals WHERE referred = ?")
            .bind(user.as_str())
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| Address::new(r.get::<String, _>("referrer"))))
    }

    /// Record a referral relationship. First referrer wins.
    pub async fn insert_referral(&self, referral: &Referral) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO referrals (referred, referrer, created_at_ms)
            VALUES (?, ?, ?)
            ON CONFLICT(referred) DO NOTHING
            "#,
        )
        .bind(referral.referred.as_str())
        .bind(referral.referrer.as_str())
        .bind(TimeMs::now().as_i64())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Global settings
    // =========================================================================

    /// Read the settings singleton, creating the default row when absent.
    pub async fn get_settings(&self) -> Result<GlobalSettings, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT total_pools,
                   bootstrapping_active, bootstrapping_start,
                   early_season_active, early_season_start,
                   meme_season_active, meme_season_start
            FROM settings WHERE id = 1
            "#,
        )
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(r) => Ok(row_to_settings(&r)),
            None => {
                let defaults = GlobalSettings::default();
                self.update_settings(&defaults).await?;
                Ok(defaults)
            }
        }
    }

    /// Write the settings singleton. The engine only reads settings; this
    /// exists for the external admin surface and tests.
    pub async fn update_settings(&self, settings: &GlobalSettings) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO settings (
                id, total_pools,
                bootstrapping_active, bootstrapping_start,
                early_season_active, early_season_start,
                meme_season_active, meme_season_start
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                total_pools = excluded.total_pools,
                bootstrapping_active = excluded.bootstrapping_active,
                bootstrapping_start = excluded.bootstrapping_start,
                early_season_active = excluded.early_season_active,
                early_season_start = excluded.early_season_start,
                meme_season_active = excluded.meme_season_active,
                meme_season_start = excluded.meme_season_start
            "#,
        )
        .bind(settings.total_pools)
        .bind(settings.bootstrapping.is_active as i64)
        .bind(settings.bootstrapping.start_date.map(|d| d.to_string()))
        .bind(settings.early_season.is_active as i64)
        .bind(settings.early_season.start_date.map(|d| d.to_string()))
        .bind(settings.meme_season.is_active as i64)
        .bind(settings.meme_season.start_date.map(|d| d.to_string()))
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

fn campaign_state(row: &sqlx::sqlite::SqliteRow, active_col: &str, start_col: &str) -> CampaignState {
    CampaignState {
        is_active: row.get::<i64, _>(active_col) != 0,
        start_date: row
            .get::<Option<String>, _>(start_col)
            .and_then(|s| Day::parse(&s)),
    }
}

fn row_to_settings(row: &sqlx::sqlite::SqliteRow) -> GlobalSettings {
    GlobalSettings {
        total_pools: row.get("total_pools"),
        bootstrapping: campaign_state(row, "bootstrapping_active", "bootstrapping_start"),
        early_season: campaign_state(row, "early_season_active", "early_season_start"),
        meme_season: campaign_state(row, "meme_season_active", "meme_season_start"),
    }
}

fn row_to_user_points(row: &sqlx::sqlite::SqliteRow) -> UserPoints {
    let date_str: String = row.get("date");
    UserPoints {
        user: Address::new(row.get::<String, _>("user")),
        pool: PoolAddress(row.get::<String, _>("pool")),
        date: Day::parse(&date_str).unwrap_or_else(Day::today),
        liquidity_points: parse_stored_decimal(
            &row.get::<String, _>("liquidity_points"),
            "liquidity_points",
        ),
        swap_points: parse_stored_decimal(&row.get::<String, _>("swap_points"), "swap_points"),
        referral_points: parse_stored_decimal(
            &row.get::<String, _>("referral_points"),
            "referral_points",
        ),
        pool_type: row
            .get::<Option<String>, _>("pool_type")
            .and_then(|s| PoolType::parse(&s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_overwrite_liquidity_points_idempotent() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xuser".to_string());
        let pool = PoolAddress::new("0xpool".to_string());
        let date = Day::parse("2024-03-11").unwrap();

        repo.overwrite_liquidity_points(&user, &pool, date, dec("1500"), Some(PoolType::VolatileStable))
            .await
            .unwrap();
        repo.overwrite_liquidity_points(&user, &pool, date, dec("1500"), Some(PoolType::VolatileStable))
            .await
            .unwrap();

        let row = repo.get_user_points(&user, &pool, date).await.unwrap().unwrap();
        assert_eq!(row.liquidity_points, dec("1500"));
        assert_eq!(row.pool_type, Some(PoolType::VolatileStable));
    }

    #[tokio::test]
    async fn test_overwrite_preserves_additive_buckets() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xuser".to_string());
        let pool = PoolAddress::new("0xpool".to_string());
        let date = Day::parse("2024-03-11").unwrap();

        repo.add_swap_points(&user, &pool, date, dec("10"), None)
            .await
            .unwrap();
        repo.overwrite_liquidity_points(&user, &pool, date, dec("1500"), None)
            .await
            .unwrap();

        let row = repo.get_user_points(&user, &pool, date).await.unwrap().unwrap();
        assert_eq!(row.swap_points, dec("10"));
        assert_eq!(row.liquidity_points, dec("1500"));
    }

    #[tokio::test]
    async fn test_swap_points_accumulate() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xuser".to_string());
        let pool = PoolAddress::new("0xpool".to_string());
        let date = Day::parse("2024-03-11").unwrap();

        repo.add_swap_points(&user, &pool, date, dec("10"), None)
            .await
            .unwrap();
        repo.add_swap_points(&user, &pool, date, dec("2.5"), None)
            .await
            .unwrap();

        let row = repo.get_user_points(&user, &pool, date).await.unwrap().unwrap();
        assert_eq!(row.swap_points, dec("12.5"));
    }

    #[tokio::test]
    async fn test_referral_points_accumulate_on_reserved_row() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xuser".to_string());
        let date = Day::parse("2024-03-11").unwrap();

        repo.add_referral_points(&user, date, dec("100")).await.unwrap();
        repo.add_referral_points(&user, date, dec("50")).await.unwrap();

        let row = repo
            .get_user_points(&user, &PoolAddress::referral(), date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.referral_points, dec("150"));
        assert_eq!(row.liquidity_points, Decimal::zero());
    }

    #[tokio::test]
    async fn test_referral_relationship_first_wins() {
        let (repo, _temp) = setup_test_db().await;
        let referred = Address::new("0xreferred".to_string());

        let first = Referral {
            referred: referred.clone(),
            referrer: Address::new("0xalice".to_string()),
        };
        let second = Referral {
            referred: referred.clone(),
            referrer: Address::new("0xbob".to_string()),
        };

        assert!(repo.insert_referral(&first).await.unwrap());
        assert!(!repo.insert_referral(&second).await.unwrap());

        let referrer = repo.get_referrer(&referred).await.unwrap();
        assert_eq!(referrer, Some(Address::new("0xalice".to_string())));
    }

    #[tokio::test]
    async fn test_no_referrer_is_none() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xnobody".to_string());
        assert_eq!(repo.get_referrer(&user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_settings_default_created_on_first_read() {
        let (repo, _temp) = setup_test_db().await;

        let settings = repo.get_settings().await.unwrap();
        assert_eq!(settings, GlobalSettings::default());

        // The row persists after first read.
        let again = repo.get_settings().await.unwrap();
        assert_eq!(again, settings);
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let (repo, _temp) = setup_test_db().await;

        let mut settings = GlobalSettings::default();
        settings.total_pools = 12;
        settings.bootstrapping = CampaignState {
            is_active: true,
            start_date: Day::parse("2024-03-01"),
        };
        repo.update_settings(&settings).await.unwrap();

        let stored = repo.get_settings().await.unwrap();
        assert_eq!(stored, settings);
    }
}
