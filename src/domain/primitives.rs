//! Domain primitives: TimeMs, Day, Address, TokenAddress, PoolAddress.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// A calendar day (UTC). Balance and points rows are keyed by day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Day(pub NaiveDate);

impl Day {
    pub fn new(date: NaiveDate) -> Self {
        Day(date)
    }

    /// Parse from canonical `YYYY-MM-DD` form.
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Day)
    }

    /// Today in UTC.
    pub fn today() -> Self {
        Day(chrono::Utc::now().date_naive())
    }

    pub fn previous(&self) -> Self {
        Day(self.0.pred_opt().unwrap_or(self.0))
    }

    /// Whole days from `earlier` to `self`. Negative if `earlier` is later.
    pub fn days_since(&self, earlier: Day) -> i64 {
        (self.0 - earlier.0).num_days()
    }

    pub fn as_date(&self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Wallet address (hex string, stored lowercase).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create an Address, normalizing to lowercase.
    pub fn new(addr: String) -> Self {
        Address(addr.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ERC-20 token contract address (hex string, stored lowercase).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenAddress(pub String);

impl TokenAddress {
    pub fn new(addr: String) -> Self {
        TokenAddress(addr.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Liquidity pool address.
///
/// Not always a real contract address: events without a pool id get a
/// synthesized `token1_token2` key, and points summary rows use the reserved
/// `ALL` / `REFERRAL` keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolAddress(pub String);

impl PoolAddress {
    pub fn new(addr: String) -> Self {
        PoolAddress(addr.to_lowercase())
    }

    /// Reserved pool key for the per-user daily summary row.
    pub fn summary() -> Self {
        PoolAddress("ALL".to_string())
    }

    /// Reserved pool key for referral-bonus-only rows.
    pub fn referral() -> Self {
        PoolAddress("REFERRAL".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PoolAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
