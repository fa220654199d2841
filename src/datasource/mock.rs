//! Mock sources for testing without network calls.

use super::{EventSource, PriceOracle, SourceError};
use crate::domain::{Decimal, PoolEvent, PoolReserves};
use async_trait::async_trait;

/// Mock event source returning predefined events.
#[derive(Debug, Clone, Default)]
pub struct MockEventSource {
    events: Vec<PoolEvent>,
    fail: bool,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the mock feed.
    pub fn with_event(mut self, event: PoolEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Add multiple events to the mock feed.
    pub fn with_events(mut self, events: Vec<PoolEvent>) -> Self {
        self.events.extend(events);
        self
    }

    /// Make every fetch fail with a network error.
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn fetch_events(
        &self,
        after_block: i64,
        limit: i64,
    ) -> Result<Vec<PoolEvent>, SourceError> {
        if self.fail {
            return Err(SourceError::NetworkError("mock failure".to_string()));
        }

        let mut events: Vec<PoolEvent> = self
            .events
            .iter()
            .filter(|e| e.block_height > after_block)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.block_height);
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }
}

/// Mock price oracle with a fixed base price and pool set.
#[derive(Debug, Clone, Default)]
pub struct MockPriceOracle {
    base_price: Option<Decimal>,
    pools: Vec<PoolReserves>,
    fail: bool,
}

impl MockPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_price(mut self, price: Decimal) -> Self {
        self.base_price = Some(price);
        self
    }

    pub fn with_pool(mut self, pool: PoolReserves) -> Self {
        self.pools.push(pool);
        self
    }

    pub fn with_pools(mut self, pools: Vec<PoolReserves>) -> Self {
        self.pools.extend(pools);
        self
    }

    /// Make every fetch fail with a network error.
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl PriceOracle for MockPriceOracle {
    async fn base_asset_price_usd(&self) -> Result<Option<Decimal>, SourceError> {
        if self.fail {
            return Err(SourceError::NetworkError("mock failure".to_string()));
        }
        Ok(self.base_price)
    }

    async fn fetch_all_pools(&self) -> Result<Vec<PoolReserves>, SourceError> {
        if self.fail {
            return Err(SourceError::NetworkError("mock failure".to_string()));
        }
        Ok(self.pools.clone())
    }
}
