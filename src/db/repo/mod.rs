//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `events.rs` - Processed-event dedup and swap transactions
//! - `liquidity.rs` - Pool configs, liquidity transactions, daily balances
//! - `points.rs` - Points rows, referrals, global settings
//!
//! Monetary values are stored as canonical decimal strings and summed in
//! Rust. SQLite aggregates return REAL (float), which would lose precision
//! for points economics.

mod events;
mod liquidity;
mod points;

use crate::domain::Decimal;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Parse a stored decimal, logging and defaulting to zero on corruption.
pub(crate) fn parse_stored_decimal(raw: &str, context: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        warn!(
            value = %raw,
            context = %context,
            error = %e,
            "Failed to parse stored decimal, using zero"
        );
        Decimal::zero()
    })
}
