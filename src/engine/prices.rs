//! Per-cycle token price snapshot.
//!
//! Rebuilt wholesale before every ingestion cycle: every token paired against
//! the base asset is priced from its deepest pool's reserve ratio. Tokens
//! that cannot be priced are simply absent; consumers treat absence as
//! "unknown" and skip, never as zero.

use crate::domain::{Decimal, PoolReserves, TokenAddress};
use std::collections::HashMap;

/// Acceptance thresholds for derived prices.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotLimits {
    pub min_base_reserve: Decimal,
    pub min_token_reserve: Decimal,
    pub min_usd_price: Decimal,
}

/// Immutable token -> USD price map for one cycle.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    prices: HashMap<TokenAddress, Decimal>,
}

impl PriceSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Derive the snapshot from pool reserves and the base asset's USD price.
    ///
    /// For each token paired against the base asset where both reserves
    /// exceed the configured minimums, the pool with the deepest base-asset
    /// reserve wins: `price = base_reserve / token_reserve * base_price`.
    /// Prices at or below the floor are rejected.
    pub fn build(
        base_asset: &TokenAddress,
        base_price: Decimal,
        pools: &[PoolReserves],
        limits: SnapshotLimits,
    ) -> Self {
        let mut best_pool: HashMap<TokenAddress, (Decimal, Decimal)> = HashMap::new();

        for pool in pools {
            let (token, base_reserve, token_reserve) = if &pool.token1 == base_asset {
                (&pool.token2, pool.reserved1, pool.reserved2)
            } else if &pool.token2 == base_asset {
                (&pool.token1, pool.reserved2, pool.reserved1)
            } else {
                continue;
            };

            if base_reserve <= limits.min_base_reserve || token_reserve <= limits.min_token_reserve
            {
                continue;
            }

            let entry = best_pool.entry(token.clone());
            match entry {
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    if base_reserve > slot.get().0 {
                        slot.insert((base_reserve, token_reserve));
                    }
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert((base_reserve, token_reserve));
                }
            }
        }

        let mut prices = HashMap::new();
        prices.insert(base_asset.clone(), base_price);

        for (token, (base_reserve, token_reserve)) in best_pool {
            if token_reserve.is_zero() {
                continue;
            }
            let price = base_reserve / token_reserve * base_price;
            if price > limits.min_usd_price {
                prices.insert(token, price);
            }
        }

        PriceSnapshot { prices }
    }

    /// USD price for a token, or None when the snapshot could not price it.
    pub fn get(&self, token: &TokenAddress) -> Option<Decimal> {
        self.prices.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Test/seed constructor from explicit prices.
    pub fn from_prices(prices: HashMap<TokenAddress, Decimal>) -> Self {
        PriceSnapshot { prices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn token(s: &str) -> TokenAddress {
        TokenAddress::new(s.to_string())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn limits() -> SnapshotLimits {
        SnapshotLimits {
            min_base_reserve: dec("100"),
            min_token_reserve: dec("100"),
            min_usd_price: dec("0.0000001"),
        }
    }

    fn pool(t1: &str, t2: &str, r1: &str, r2: &str) -> PoolReserves {
        PoolReserves {
            address: format!("{}_{}", t1, t2),
            token1: token(t1),
            token2: token(t2),
            reserved1: dec(r1),
            reserved2: dec(r2),
        }
    }

    #[test]
    fn test_base_asset_priced_directly() {
        let snapshot = PriceSnapshot::build(&token("0xbase"), dec("0.5"), &[], limits());
        assert_eq!(snapshot.get(&token("0xbase")), Some(dec("0.5")));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_price_from_reserve_ratio() {
        // 10_000 base / 1_000 token at base price $0.5 => token = $5
        let pools = vec![pool("0xbase", "0xfish", "10000", "1000")];
        let snapshot = PriceSnapshot::build(&token("0xbase"), dec("0.5"), &pools, limits());
        assert_eq!(snapshot.get(&token("0xfish")), Some(dec("5")));
    }

    #[test]
    fn test_base_asset_on_either_side() {
        let pools = vec![pool("0xfish", "0xbase", "1000", "10000")];
        let snapshot = PriceSnapshot::build(&token("0xbase"), dec("0.5"), &pools, limits());
        assert_eq!(snapshot.get(&token("0xfish")), Some(dec("5")));
    }

    #[test]
    fn test_deepest_pool_wins() {
        let pools = vec![
            pool("0xbase", "0xfish", "200", "1000"),
            pool("0xbase", "0xfish", "20000", "1000"),
        ];
        let snapshot = PriceSnapshot::build(&token("0xbase"), dec("1"), &pools, limits());
        assert_eq!(snapshot.get(&token("0xfish")), Some(dec("20")));
    }

    #[test]
    fn test_shallow_reserves_rejected() {
        let pools = vec![
            pool("0xbase", "0xfish", "50", "1000"),
            pool("0xbase", "0xcrab", "1000", "50"),
        ];
        let snapshot = PriceSnapshot::build(&token("0xbase"), dec("1"), &pools, limits());
        assert_eq!(snapshot.get(&token("0xfish")), None);
        assert_eq!(snapshot.get(&token("0xcrab")), None);
    }

    #[test]
    fn test_dust_price_rejected() {
        let pools = vec![pool("0xbase", "0xdust", "101", "100000000000000")];
        let snapshot =
            PriceSnapshot::build(&token("0xbase"), dec("0.0000001"), &pools, limits());
        assert_eq!(snapshot.get(&token("0xdust")), None);
    }

    #[test]
    fn test_unrelated_pools_ignored() {
        let pools = vec![pool("0xfish", "0xcrab", "10000", "10000")];
        let snapshot = PriceSnapshot::build(&token("0xbase"), dec("1"), &pools, limits());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_missing_token_is_none() {
        let snapshot = PriceSnapshot::empty();
        assert_eq!(snapshot.get(&token("0xanything")), None);
        assert!(snapshot.is_empty());
    }
}
