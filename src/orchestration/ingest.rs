//! Event ingestion cycle: classify, value, record, and deduplicate pool
//! events from the block-ordered feed.

use crate::config::Config;
use crate::datasource::{EventSource, PriceOracle, SourceError};
use crate::db::Repository;
use crate::domain::{
    Address, Day, Decimal, EventKind, LiquidityTransaction, LiquidityTxKind, PoolConfig,
    PoolEvent, PoolType, SwapTransaction, TimeMs,
};
use crate::engine::{PriceSnapshot, SnapshotLimits};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why an event was skipped. Skipped events are still marked processed so
/// they are never refetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A pool token is on the static ineligibility list.
    IneligibleToken,
    /// A token price was absent from this cycle's snapshot.
    MissingPrice,
    /// No usable acting address on the event.
    MissingUser,
    /// An amount field could not be parsed.
    MalformedAmount,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::IneligibleToken => write!(f, "ineligible token"),
            SkipReason::MissingPrice => write!(f, "missing token price"),
            SkipReason::MissingUser => write!(f, "missing user address"),
            SkipReason::MalformedAmount => write!(f, "malformed amount"),
        }
    }
}

/// Outcome of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// A ledger row was appended.
    Recorded,
    /// Deliberately skipped; marked processed, never retried.
    Skipped(SkipReason),
}

/// Errors that abort the ingestion cycle.
///
/// Source errors are transient: nothing past the last marked event is lost
/// and the next scheduled tick retries from the cursor.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Summary of one ingestion cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub recorded: usize,
    pub skipped: usize,
}

/// Polls the event source from the dedup cursor and routes events into the
/// transaction ledgers.
pub struct EventIngestor {
    source: Arc<dyn EventSource>,
    oracle: Arc<dyn PriceOracle>,
    repo: Arc<Repository>,
    config: Config,
    /// Token price cache, rebuilt wholesale at the start of every cycle.
    prices: PriceSnapshot,
}

impl EventIngestor {
    pub fn new(
        source: Arc<dyn EventSource>,
        oracle: Arc<dyn PriceOracle>,
        repo: Arc<Repository>,
        config: Config,
    ) -> Self {
        Self {
            source,
            oracle,
            repo,
            config,
            prices: PriceSnapshot::empty(),
        }
    }

    /// Run one ingestion cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, IngestError> {
        self.refresh_prices().await?;

        let cursor = self.repo.last_processed_block().await?;
        let events = self
            .source
            .fetch_events(cursor, self.config.event_page_size)
            .await?;

        let mut report = CycleReport {
            fetched: events.len(),
            ..CycleReport::default()
        };

        if events.is_empty() {
            debug!(cursor, "No new events to process");
            return Ok(report);
        }

        info!(cursor, count = events.len(), "Found new events to process");

        for event in &events {
            let event_key = event.event_key();
            if self.repo.is_event_processed(&event_key).await? {
                continue;
            }

            match self.handle_event(event).await? {
                HandleOutcome::Recorded => report.recorded += 1,
                HandleOutcome::Skipped(reason) => {
                    warn!(
                        event_id = %event_key,
                        kind = %event.kind,
                        %reason,
                        "Skipping event"
                    );
                    report.skipped += 1;
                }
            }

            self.repo
                .mark_event_processed(&event_key, event.block_height)
                .await?;

            if self.config.inter_event_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.inter_event_delay_ms)).await;
            }
        }

        Ok(report)
    }

    /// Rebuild the token price snapshot from the oracle.
    ///
    /// An unavailable base price yields an empty snapshot for the cycle:
    /// events then skip as unpriced rather than being valued at zero.
    async fn refresh_prices(&mut self) -> Result<(), IngestError> {
        let pools = self.oracle.fetch_all_pools().await?;
        let base_price = self.oracle.base_asset_price_usd().await?;

        self.prices = match base_price {
            Some(price) => {
                let snapshot = PriceSnapshot::build(
                    &self.config.base_asset,
                    price,
                    &pools,
                    SnapshotLimits {
                        min_base_reserve: self.config.min_base_reserve,
                        min_token_reserve: self.config.min_token_reserve,
                        min_usd_price: self.config.min_usd_price,
                    },
                );
                debug!(tokens = snapshot.len(), "Refreshed token prices");
                snapshot
            }
            None => {
                warn!("Base asset price unavailable; no token can be priced this cycle");
                PriceSnapshot::empty()
            }
        };
        Ok(())
    }

    async fn handle_event(&self, event: &PoolEvent) -> Result<HandleOutcome, IngestError> {
        if self.config.ineligible_tokens.contains(&event.pool.token1)
            || self.config.ineligible_tokens.contains(&event.pool.token2)
        {
            return Ok(HandleOutcome::Skipped(SkipReason::IneligibleToken));
        }

        match event.kind {
            EventKind::Swap => self.handle_swap(event).await,
            EventKind::Mint => self.handle_mint(event).await,
            EventKind::Burn => self.handle_burn(event).await,
        }
    }

    async fn handle_swap(&self, event: &PoolEvent) -> Result<HandleOutcome, IngestError> {
        let user = match event.to_address.as_ref().or(event.sender_address.as_ref()) {
            Some(addr) => Address::new(addr.clone()),
            None => return Ok(HandleOutcome::Skipped(SkipReason::MissingUser)),
        };

        let (price1, price2) = match (
            self.prices.get(&event.pool.token1),
            self.prices.get(&event.pool.token2),
        ) {
            (Some(p1), Some(p2)) => (p1, p2),
            _ => return Ok(HandleOutcome::Skipped(SkipReason::MissingPrice)),
        };

        let (amount1, amount2) = match (event.amount1_tokens(), event.amount2_tokens()) {
            (Some(a1), Some(a2)) => (a1.abs(), a2.abs()),
            _ => return Ok(HandleOutcome::Skipped(SkipReason::MalformedAmount)),
        };

        // Average of the two legs' USD values.
        let volume = (amount1 * price1 + amount2 * price2) / Decimal::from_i64(2);
        let value_usd = volume.min(self.config.safe_max_value_usd);

        self.ensure_pool_config(event).await?;

        let swap = SwapTransaction {
            user: user.clone(),
            pool: event.pool.canonical_address(),
            token_in: event.pool.token1.clone(),
            token_out: event.pool.token2.clone(),
            amount_in: amount1,
            amount_out: amount2,
            value_usd,
            date: Day::today(),
            created_at: TimeMs::now(),
        };
        self.repo.insert_swap_transaction(&swap).await?;

        info!(user = %user, pool = %swap.pool, volume = %value_usd, "Recorded swap");
        Ok(HandleOutcome::Recorded)
    }

    async fn handle_mint(&self, event: &PoolEvent) -> Result<HandleOutcome, IngestError> {
        // Mints may arrive without a recipient; fall back to the sender.
        let user = match event.to_address.as_ref().or(event.sender_address.as_ref()) {
            Some(addr) => Address::new(addr.clone()),
            None => return Ok(HandleOutcome::Skipped(SkipReason::MissingUser)),
        };

        self.record_liquidity(event, user, LiquidityTxKind::Mint).await
    }

    async fn handle_burn(&self, event: &PoolEvent) -> Result<HandleOutcome, IngestError> {
        // Burns pay out to an explicit recipient; without one there is no
        // ledger to debit.
        let user = match event.to_address.as_ref() {
            Some(addr) => Address::new(addr.clone()),
            None => return Ok(HandleOutcome::Skipped(SkipReason::MissingUser)),
        };

        self.record_liquidity(event, user, LiquidityTxKind::Burn).await
    }

    async fn record_liquidity(
        &self,
        event: &PoolEvent,
        user: Address,
        kind: LiquidityTxKind,
    ) -> Result<HandleOutcome, IngestError> {
        let (price1, price2) = match (
            self.prices.get(&event.pool.token1),
            self.prices.get(&event.pool.token2),
        ) {
            (Some(p1), Some(p2)) => (p1, p2),
            _ => return Ok(HandleOutcome::Skipped(SkipReason::MissingPrice)),
        };

        // Burn amounts arrive negative; the ledger stores magnitudes and the
        // replay applies the sign from the transaction kind.
        let (amount1, amount2) = match (event.amount1_tokens(), event.amount2_tokens()) {
            (Some(a1), Some(a2)) => (a1.abs(), a2.abs()),
            _ => return Ok(HandleOutcome::Skipped(SkipReason::MalformedAmount)),
        };

        let value = amount1 * price1 + amount2 * price2;
        let value_usd = value.min(self.config.safe_max_value_usd);

        self.ensure_pool_config(event).await?;

        let tx = LiquidityTransaction {
            user: user.clone(),
            pool: event.pool.canonical_address(),
            kind,
            value_usd,
            date: Day::today(),
            created_at: TimeMs::now(),
        };
        self.repo.insert_liquidity_transaction(&tx).await?;

        info!(user = %user, pool = %tx.pool, %kind, value = %value_usd, "Recorded liquidity transaction");
        Ok(HandleOutcome::Recorded)
    }

    /// Lazily create the pool config on first sight of a pool.
    async fn ensure_pool_config(&self, event: &PoolEvent) -> Result<PoolConfig, sqlx::Error> {
        let pool_address = event.pool.canonical_address();
        if let Some(existing) = self.repo.get_pool_config(&pool_address).await? {
            return Ok(existing);
        }

        let pool_type = PoolType::detect(
            &event.pool.token1,
            &event.pool.token2,
            &self.config.stablecoins,
        );
        info!(pool = %pool_address, %pool_type, "Creating pool config with detected type");

        let config = PoolConfig::new(
            pool_address.clone(),
            event.pool.token1.clone(),
            event.pool.token2.clone(),
            pool_type,
        );
        self.repo.insert_pool_config_if_absent(&config).await?;

        // A concurrent insert may have won; the stored row is authoritative.
        Ok(self
            .repo
            .get_pool_config(&pool_address)
            .await?
            .unwrap_or(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{MockEventSource, MockPriceOracle};
    use crate::db::migrations::init_db;
    use crate::domain::{PoolAddress, PoolRef, PoolReserves, TokenAddress};
    use std::collections::HashMap;
    use std::str::FromStr;
    use tempfile::TempDir;

    const BASE: &str = "0xbase";
    const USDC: &str = "0xusdc";
    const FISH: &str = "0xfish";

    async fn setup_repo() -> (Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Arc::new(Repository::new(pool)), temp_dir)
    }

    fn test_config() -> Config {
        let mut env = HashMap::new();
        env.insert("DATABASE_PATH".to_string(), ":memory:".to_string());
        env.insert(
            "EVENT_SOURCE_URL".to_string(),
            "http://example.invalid/graphql".to_string(),
        );
        env.insert(
            "BASE_PRICE_URL".to_string(),
            "http://example.invalid/price".to_string(),
        );
        env.insert("BASE_ASSET_ADDRESS".to_string(), BASE.to_string());
        env.insert("STABLECOIN_ADDRESSES".to_string(), USDC.to_string());
        env.insert("EVENT_PROCESSING_DELAY_MS".to_string(), "0".to_string());
        Config::from_env_map(env).expect("config")
    }

    fn oracle_with_prices() -> MockPriceOracle {
        // base = $0.5; usdc and fish both priced through deep base pools.
        MockPriceOracle::new()
            .with_base_price(Decimal::from_str("0.5").unwrap())
            .with_pool(PoolReserves {
                address: "0xp1".to_string(),
                token1: TokenAddress::new(BASE.to_string()),
                token2: TokenAddress::new(USDC.to_string()),
                reserved1: Decimal::from_str("20000").unwrap(),
                reserved2: Decimal::from_str("10000").unwrap(),
            })
            .with_pool(PoolReserves {
                address: "0xp2".to_string(),
                token1: TokenAddress::new(BASE.to_string()),
                token2: TokenAddress::new(FISH.to_string()),
                reserved1: Decimal::from_str("40000").unwrap(),
                reserved2: Decimal::from_str("10000").unwrap(),
            })
    }

    fn mint_event(id: &str, block: i64, to: Option<&str>, t1: &str, t2: &str) -> PoolEvent {
        PoolEvent {
            id: id.to_string(),
            block_height: block,
            kind: EventKind::Mint,
            to_address: to.map(|s| s.to_string()),
            sender_address: None,
            signer_address: None,
            // 100 of each token
            amount1: "100000000000000000000".to_string(),
            amount2: "100000000000000000000".to_string(),
            pool: PoolRef {
                id: Some("0xpool".to_string()),
                token1: TokenAddress::new(t1.to_string()),
                token2: TokenAddress::new(t2.to_string()),
            },
        }
    }

    fn ingestor(
        source: MockEventSource,
        oracle: MockPriceOracle,
        repo: Arc<Repository>,
        config: Config,
    ) -> EventIngestor {
        EventIngestor::new(Arc::new(source), Arc::new(oracle), repo, config)
    }

    #[tokio::test]
    async fn test_mint_event_recorded_and_marked() {
        let (repo, _temp) = setup_repo().await;
        let source =
            MockEventSource::new().with_event(mint_event("e1", 100, Some("0xUser"), BASE, FISH));
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());

        let report = ing.run_cycle().await.unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.recorded, 1);
        assert_eq!(report.skipped, 0);

        assert!(repo.is_event_processed("e1").await.unwrap());
        assert_eq!(repo.last_processed_block().await.unwrap(), 100);

        let user = Address::new("0xuser".to_string());
        let txs = repo
            .query_liquidity_transactions(&user, Day::today())
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, LiquidityTxKind::Mint);
        // 100 * $0.5 (base) + 100 * $2 (fish at 40000/10000 * 0.5)
        assert_eq!(txs[0].value_usd, Decimal::from_str("250").unwrap());

        let config = repo
            .get_pool_config(&PoolAddress::new("0xpool".to_string()))
            .await
            .unwrap()
            .expect("pool config created");
        assert_eq!(config.pool_type, PoolType::VolatileVolatile);
    }

    #[tokio::test]
    async fn test_second_cycle_does_not_reprocess() {
        let (repo, _temp) = setup_repo().await;
        let source =
            MockEventSource::new().with_event(mint_event("e1", 100, Some("0xuser"), BASE, FISH));
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());

        ing.run_cycle().await.unwrap();
        let report2 = ing.run_cycle().await.unwrap();
        assert_eq!(report2.fetched, 0);

        let user = Address::new("0xuser".to_string());
        let txs = repo
            .query_liquidity_transactions(&user, Day::today())
            .await
            .unwrap();
        assert_eq!(txs.len(), 1, "no duplicate ledger rows");
    }

    #[tokio::test]
    async fn test_ineligible_token_skipped_and_marked() {
        let (repo, _temp) = setup_repo().await;
        let mut config = test_config();
        config
            .ineligible_tokens
            .insert(TokenAddress::new(FISH.to_string()));

        let source =
            MockEventSource::new().with_event(mint_event("e1", 100, Some("0xuser"), BASE, FISH));
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), config);

        let report = ing.run_cycle().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.recorded, 0);

        // Marked processed: re-running fetches nothing and creates no rows.
        assert!(repo.is_event_processed("e1").await.unwrap());
        let report2 = ing.run_cycle().await.unwrap();
        assert_eq!(report2.fetched, 0);

        let user = Address::new("0xuser".to_string());
        let txs = repo
            .query_liquidity_transactions(&user, Day::today())
            .await
            .unwrap();
        assert!(txs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_price_skipped_without_rows() {
        let (repo, _temp) = setup_repo().await;
        // 0xdark has no pool against the base asset, so no price.
        let source =
            MockEventSource::new().with_event(mint_event("e1", 100, Some("0xuser"), BASE, "0xdark"));
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());

        let report = ing.run_cycle().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(repo.is_event_processed("e1").await.unwrap());

        let user = Address::new("0xuser".to_string());
        let txs = repo
            .query_liquidity_transactions(&user, Day::today())
            .await
            .unwrap();
        assert!(txs.is_empty());
    }

    #[tokio::test]
    async fn test_mint_without_any_address_skipped() {
        let (repo, _temp) = setup_repo().await;
        let source = MockEventSource::new().with_event(mint_event("e1", 100, None, BASE, FISH));
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());

        let report = ing.run_cycle().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(repo.is_event_processed("e1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mint_falls_back_to_sender() {
        let (repo, _temp) = setup_repo().await;
        let mut event = mint_event("e1", 100, None, BASE, FISH);
        event.sender_address = Some("0xSender".to_string());
        let source = MockEventSource::new().with_event(event);
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());

        let report = ing.run_cycle().await.unwrap();
        assert_eq!(report.recorded, 1);

        let user = Address::new("0xsender".to_string());
        let txs = repo
            .query_liquidity_transactions(&user, Day::today())
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
    }

    #[tokio::test]
    async fn test_burn_requires_recipient_and_stores_magnitude() {
        let (repo, _temp) = setup_repo().await;

        let mut no_recipient = mint_event("e1", 100, None, BASE, FISH);
        no_recipient.kind = EventKind::Burn;
        no_recipient.sender_address = Some("0xsender".to_string());

        let mut burn = mint_event("e2", 101, Some("0xuser"), BASE, FISH);
        burn.kind = EventKind::Burn;
        burn.amount1 = "-100000000000000000000".to_string();
        burn.amount2 = "-100000000000000000000".to_string();

        let source = MockEventSource::new()
            .with_event(no_recipient)
            .with_event(burn);
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());

        let report = ing.run_cycle().await.unwrap();
        assert_eq!(report.recorded, 1);
        assert_eq!(report.skipped, 1);

        let user = Address::new("0xuser".to_string());
        let txs = repo
            .query_liquidity_transactions(&user, Day::today())
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, LiquidityTxKind::Burn);
        assert!(txs[0].value_usd.is_positive());
        assert_eq!(txs[0].value_usd, Decimal::from_str("250").unwrap());
    }

    #[tokio::test]
    async fn test_swap_volume_is_leg_average() {
        let (repo, _temp) = setup_repo().await;
        let mut swap = mint_event("e1", 100, Some("0xtrader"), BASE, FISH);
        swap.kind = EventKind::Swap;
        let source = MockEventSource::new().with_event(swap);
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());

        ing.run_cycle().await.unwrap();

        let user = Address::new("0xtrader".to_string());
        let swaps = repo
            .query_swap_transactions(&user, Day::today())
            .await
            .unwrap();
        assert_eq!(swaps.len(), 1);
        // (100 * 0.5 + 100 * 2) / 2 = 125
        assert_eq!(swaps[0].value_usd, Decimal::from_str("125").unwrap());
    }

    #[tokio::test]
    async fn test_value_clamped_to_safety_ceiling() {
        let (repo, _temp) = setup_repo().await;
        let mut config = test_config();
        config.safe_max_value_usd = Decimal::from_str("100").unwrap();

        let source =
            MockEventSource::new().with_event(mint_event("e1", 100, Some("0xuser"), BASE, FISH));
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), config);

        ing.run_cycle().await.unwrap();

        let user = Address::new("0xuser".to_string());
        let txs = repo
            .query_liquidity_transactions(&user, Day::today())
            .await
            .unwrap();
        assert_eq!(txs[0].value_usd, Decimal::from_str("100").unwrap());
    }

    #[tokio::test]
    async fn test_source_failure_aborts_cycle_without_marking() {
        let (repo, _temp) = setup_repo().await;
        let source = MockEventSource::new().with_failure();
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());

        let result = ing.run_cycle().await;
        assert!(matches!(result, Err(IngestError::Source(_))));
        assert_eq!(repo.last_processed_block().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_base_price_skips_all_events() {
        let (repo, _temp) = setup_repo().await;
        let oracle = MockPriceOracle::new(); // no base price
        let source =
            MockEventSource::new().with_event(mint_event("e1", 100, Some("0xuser"), BASE, FISH));
        let mut ing = ingestor(source, oracle, repo.clone(), test_config());

        let report = ing.run_cycle().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(repo.is_event_processed("e1").await.unwrap());
    }

    #[tokio::test]
    async fn test_pool_type_derived_once() {
        let (repo, _temp) = setup_repo().await;

        // Pre-create the config as volatile/stable; later events must not
        // reclassify it.
        let existing = PoolConfig::new(
            PoolAddress::new("0xpool".to_string()),
            TokenAddress::new(BASE.to_string()),
            TokenAddress::new(USDC.to_string()),
            PoolType::VolatileStable,
        );
        repo.insert_pool_config_if_absent(&existing).await.unwrap();

        let source =
            MockEventSource::new().with_event(mint_event("e1", 100, Some("0xuser"), BASE, FISH));
        let mut ing = ingestor(source, oracle_with_prices(), repo.clone(), test_config());
        ing.run_cycle().await.unwrap();

        let stored = repo
            .get_pool_config(&PoolAddress::new("0xpool".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.pool_type, PoolType::VolatileStable);
    }
}
