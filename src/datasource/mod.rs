//! External source abstractions: the pool event feed and the price oracle.

use crate::domain::{Decimal, PoolEvent, PoolReserves};
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod squid;

pub use mock::{MockEventSource, MockPriceOracle};
pub use squid::{SquidEventSource, SquidPriceOracle};

/// Block-ordered, append-only feed of pool lifecycle events.
///
/// Implementations must handle retry/backoff and rate limiting.
#[async_trait]
pub trait EventSource: Send + Sync + fmt::Debug {
    /// Fetch events with block height strictly greater than `after_block`,
    /// ordered ascending by block height, at most `limit` events.
    async fn fetch_events(
        &self,
        after_block: i64,
        limit: i64,
    ) -> Result<Vec<PoolEvent>, SourceError>;
}

/// Price data needed to build the per-cycle token price snapshot.
#[async_trait]
pub trait PriceOracle: Send + Sync + fmt::Debug {
    /// USD price of the base asset, or None when the oracle cannot price it.
    async fn base_asset_price_usd(&self) -> Result<Option<Decimal>, SourceError>;

    /// Reserve state of every known pool.
    async fn fetch_all_pools(&self) -> Result<Vec<PoolReserves>, SourceError>;
}

/// Error type for upstream source operations.
///
/// All variants are treated as transient by the ingestion cycle: the cycle
/// aborts without advancing the cursor and the next scheduled tick retries.
#[derive(Debug, Clone)]
pub enum SourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            SourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            SourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            SourceError::RateLimited => write!(f, "Rate limited"),
            SourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display() {
        let err = SourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = SourceError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = SourceError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");

        let err = SourceError::RateLimited;
        assert_eq!(err.to_string(), "Rate limited");
    }
}
