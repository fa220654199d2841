//! Processed-event dedup and swap transaction operations.

use crate::domain::{Address, Day, Decimal, PoolAddress, SwapTransaction, TimeMs, TokenAddress};
use sqlx::Row;

use super::{parse_stored_decimal, Repository};

impl Repository {
    // =========================================================================
    // Processed-event dedup
    // =========================================================================

    /// Whether an event id has already been consumed.
    pub async fn is_event_processed(&self, event_id: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM processed_events WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Record an event as consumed. Idempotent: re-marking is a no-op.
    ///
    /// Callers must only mark after the event's side effects are complete or
    /// deliberately skipped; a premature mark loses the event permanently.
    pub async fn mark_event_processed(
        &self,
        event_id: &str,
        block_height: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, block_height, created_at_ms)
            VALUES (?, ?, ?)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(block_height)
        .bind(TimeMs::now().as_i64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// The ingestion cursor: highest block height among consumed events,
    /// or 0 when none exist.
    pub async fn last_processed_block(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT MAX(block_height) AS max_block FROM processed_events")
            .fetch_one(self.pool())
            .await?;
        Ok(row.get::<Option<i64>, _>("max_block").unwrap_or(0))
    }

    // =========================================================================
    // Swap transactions
    // =========================================================================

    /// Append a swap transaction.
    pub async fn insert_swap_transaction(
        &self,
        swap: &SwapTransaction,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO swap_transactions (
                user, pool, token_in, token_out, amount_in, amount_out,
                value_usd, date, created_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(swap.user.as_str())
        .bind(swap.pool.as_str())
        .bind(swap.token_in.as_str())
        .bind(swap.token_out.as_str())
        .bind(swap.amount_in.to_canonical_string())
        .bind(swap.amount_out.to_canonical_string())
        .bind(swap.value_usd.to_canonical_string())
        .bind(swap.date.to_string())
        .bind(swap.created_at.as_i64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Query swap transactions for one user on one day, in creation order.
    pub async fn query_swap_transactions(
        &self,
        user: &Address,
        date: Day,
    ) -> Result<Vec<SwapTransaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user, pool, token_in, token_out, amount_in, amount_out,
                   value_usd, date, created_at_ms
            FROM swap_transactions
            WHERE user = ? AND date = ?
            ORDER BY created_at_ms ASC, id ASC
            "#,
        )
        .bind(user.as_str())
        .bind(date.to_string())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_swap).collect())
    }

    /// Total swap volume per (user, pool) for one day, summed in Rust.
    pub async fn swap_volume_by_user_pool(
        &self,
        date: Day,
    ) -> Result<Vec<(Address, PoolAddress, Decimal)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user, pool, value_usd
            FROM swap_transactions
            WHERE date = ?
            ORDER BY user ASC, pool ASC, id ASC
            "#,
        )
        .bind(date.to_string())
        .fetch_all(self.pool())
        .await?;

        let mut totals: Vec<(Address, PoolAddress, Decimal)> = Vec::new();
        for row in rows {
            let user = Address::new(row.get::<String, _>("user"));
            let pool = PoolAddress::new(row.get::<String, _>("pool"));
            let value = parse_stored_decimal(&row.get::<String, _>("value_usd"), "swap value_usd");

            match totals.last_mut() {
                Some((u, p, total)) if *u == user && *p == pool => {
                    *total = *total + value;
                }
                _ => totals.push((user, pool, value)),
            }
        }

        Ok(totals)
    }
}

fn row_to_swap(row: &sqlx::sqlite::SqliteRow) -> SwapTransaction {
    let date_str: String = row.get("date");
    SwapTransaction {
        user: Address::new(row.get::<String, _>("user")),
        pool: PoolAddress::new(row.get::<String, _>("pool")),
        token_in: TokenAddress::new(row.get::<String, _>("token_in")),
        token_out: TokenAddress::new(row.get::<String, _>("token_out")),
        amount_in: parse_stored_decimal(&row.get::<String, _>("amount_in"), "swap amount_in"),
        amount_out: parse_stored_decimal(&row.get::<String, _>("amount_out"), "swap amount_out"),
        value_usd: parse_stored_decimal(&row.get::<String, _>("value_usd"), "swap value_usd"),
        date: Day::parse(&date_str).unwrap_or_else(Day::today),
        created_at: TimeMs::new(row.get::<i64, _>("created_at_ms")),
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

    fn make_swap(user: &str, pool: &str, value: &str, created_at: i64) -> SwapTransaction {
        SwapTransaction {
            user: Address::new(user.to_string()),
            pool: PoolAddress::new(pool.to_string()),
            token_in: TokenAddress::new("0xaaa".to_string()),
            token_out: TokenAddress::new("0xbbb".to_string()),
            amount_in: Decimal::from_str("10").unwrap(),
            amount_out: Decimal::from_str("20").unwrap(),
            value_usd: Decimal::from_str(value).unwrap(),
            date: Day::parse("2024-03-11").unwrap(),
            created_at: TimeMs::new(created_at),
        }
    }

    #[tokio::test]
    async fn test_mark_and_check_processed() {
        let (repo, _temp) = setup_test_db().await;

        assert!(!repo.is_event_processed("evt-1").await.unwrap());
        repo.mark_event_processed("evt-1", 100).await.unwrap();
        assert!(repo.is_event_processed("evt-1").await.unwrap());

        // Re-marking is a no-op
        repo.mark_event_processed("evt-1", 100).await.unwrap();
    }

    #[tokio::test]
    async fn test_last_processed_block_empty_is_zero() {
        let (repo, _temp) = setup_test_db().await;
        assert_eq!(repo.last_processed_block().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_last_processed_block_is_max() {
        let (repo, _temp) = setup_test_db().await;
        repo.mark_event_processed("evt-1", 100).await.unwrap();
        repo.mark_event_processed("evt-2", 300).await.unwrap();
        repo.mark_event_processed("evt-3", 200).await.unwrap();
        assert_eq!(repo.last_processed_block().await.unwrap(), 300);
    }

    #[tokio::test]
    async fn test_insert_and_query_swaps() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xuser".to_string());
        let date = Day::parse("2024-03-11").unwrap();

        repo.insert_swap_transaction(&make_swap("0xuser", "0xpool", "100", 1))
            .await
            .unwrap();
        repo.insert_swap_transaction(&make_swap("0xuser", "0xpool", "50", 2))
            .await
            .unwrap();

        let swaps = repo.query_swap_transactions(&user, date).await.unwrap();
        assert_eq!(swaps.len(), 2);
        assert_eq!(swaps[0].value_usd, Decimal::from_str("100").unwrap());
    }

    #[tokio::test]
    async fn test_swap_volume_aggregation() {
        let (repo, _temp) = setup_test_db().await;
        let date = Day::parse("2024-03-11").unwrap();

        repo.insert_swap_transaction(&make_swap("0xuser", "0xpool1", "100", 1))
            .await
            .unwrap();
        repo.insert_swap_transaction(&make_swap("0xuser", "0xpool1", "50", 2))
            .await
            .unwrap();
        repo.insert_swap_transaction(&make_swap("0xuser", "0xpool2", "25", 3))
            .await
            .unwrap();

        let totals = repo.swap_volume_by_user_pool(date).await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].2, Decimal::from_str("150").unwrap());
        assert_eq!(totals[1].2, Decimal::from_str("25").unwrap());
    }
}
