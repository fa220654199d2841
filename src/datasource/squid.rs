//! GraphQL (squid) event source and price oracle implementations.

use super::{EventSource, PriceOracle, SourceError};
use crate::domain::{Decimal, EventKind, PoolEvent, PoolRef, PoolReserves, TokenAddress};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Pool event feed over the indexer's GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct SquidEventSource {
    client: Client,
    graphql_url: String,
}

impl SquidEventSource {
    pub fn new(graphql_url: String) -> Self {
        Self {
            client: Client::new(),
            graphql_url,
        }
    }
}

/// Price oracle combining the indexer's `allPools` query with a REST
/// endpoint for the base asset's USD price.
#[derive(Debug, Clone)]
pub struct SquidPriceOracle {
    client: Client,
    graphql_url: String,
    base_price_url: String,
}

impl SquidPriceOracle {
    pub fn new(graphql_url: String, base_price_url: String) -> Self {
        Self {
            client: Client::new(),
            graphql_url,
            base_price_url,
        }
    }
}

async fn post_graphql(
    client: &Client,
    url: &str,
    query: String,
) -> Result<serde_json::Value, SourceError> {
    let backoff = ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(30)),
        ..Default::default()
    };

    retry(backoff, || {
        let body = serde_json::json!({ "query": query.as_str() });
        async move {
            let response = client
                .post(url)
                .json(&body)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(SourceError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(SourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(SourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(SourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(SourceError::ParseError(e.to_string())))
        }
    })
    .await
}

#[async_trait]
impl EventSource for SquidEventSource {
    async fn fetch_events(
        &self,
        after_block: i64,
        limit: i64,
    ) -> Result<Vec<PoolEvent>, SourceError> {
        debug!(after_block, limit, "Fetching pool events");

        let query = format!(
            r#"query {{
                poolEvents(
                    where: {{ blockHeight_gt: {after_block}, type_in: [Swap, Mint, Burn] }},
                    orderBy: blockHeight_ASC,
                    limit: {limit}
                ) {{
                    id
                    blockHeight
                    toAddress
                    senderAddress
                    signerAddress
                    type
                    amount1
                    amount2
                    pool {{ id token1 {{ id }} token2 {{ id }} }}
                }}
            }}"#
        );

        let response = post_graphql(&self.client, &self.graphql_url, query).await?;

        let events_json = response
            .pointer("/data/poolEvents")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                SourceError::ParseError("Missing data.poolEvents in response".to_string())
            })?;

        let mut events = Vec::new();
        for event_json in events_json {
            match parse_event(event_json) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("Failed to parse pool event: {}", e);
                }
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl PriceOracle for SquidPriceOracle {
    async fn base_asset_price_usd(&self) -> Result<Option<Decimal>, SourceError> {
        debug!(url = %self.base_price_url, "Fetching base asset price");

        let response = self
            .client
            .get(&self.base_price_url)
            .send()
            .await
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::HttpError {
                status: response.status().as_u16(),
                message: "Price endpoint error".to_string(),
            });
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))?;

        Ok(body.get("usd").and_then(json_decimal))
    }

    async fn fetch_all_pools(&self) -> Result<Vec<PoolReserves>, SourceError> {
        let query = r#"query allPools {
            allPools {
                address
                reserved1
                reserved2
                token1
                token2
            }
        }"#
        .to_string();

        let response = post_graphql(&self.client, &self.graphql_url, query).await?;

        let pools_json = response
            .pointer("/data/allPools")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                SourceError::ParseError("Missing data.allPools in response".to_string())
            })?;

        let mut pools = Vec::new();
        for pool_json in pools_json {
            match parse_pool_reserves(pool_json) {
                Ok(pool) => pools.push(pool),
                Err(e) => {
                    warn!("Failed to parse pool reserves: {}", e);
                }
            }
        }

        Ok(pools)
    }
}

/// Read a JSON value as a decimal, accepting both string and number forms.
fn json_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s).ok(),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn required_str<'a>(value: &'a serde_json::Value, field: &str) -> Result<&'a str, SourceError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| SourceError::ParseError(format!("Missing {} field", field)))
}

fn optional_str(value: &serde_json::Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn parse_event(event_json: &serde_json::Value) -> Result<PoolEvent, SourceError> {
    let id = required_str(event_json, "id")?.to_string();

    let block_height = event_json
        .get("blockHeight")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| SourceError::ParseError("Missing blockHeight field".to_string()))?;

    let kind = match required_str(event_json, "type")? {
        "Swap" => EventKind::Swap,
        "Mint" => EventKind::Mint,
        "Burn" => EventKind::Burn,
        other => {
            return Err(SourceError::ParseError(format!(
                "Unknown event type: {}",
                other
            )))
        }
    };

    let pool_json = event_json
        .get("pool")
        .ok_or_else(|| SourceError::ParseError("Missing pool field".to_string()))?;

    let token1 = pool_json
        .pointer("/token1/id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SourceError::ParseError("Missing pool.token1.id field".to_string()))?;
    let token2 = pool_json
        .pointer("/token2/id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SourceError::ParseError("Missing pool.token2.id field".to_string()))?;

    Ok(PoolEvent {
        id,
        block_height,
        kind,
        to_address: optional_str(event_json, "toAddress"),
        sender_address: optional_str(event_json, "senderAddress"),
        signer_address: optional_str(event_json, "signerAddress"),
        amount1: required_str(event_json, "amount1")?.to_string(),
        amount2: required_str(event_json, "amount2")?.to_string(),
        pool: PoolRef {
            id: optional_str(pool_json, "id"),
            token1: TokenAddress::new(token1.to_string()),
            token2: TokenAddress::new(token2.to_string()),
        },
    })
}

fn parse_pool_reserves(pool_json: &serde_json::Value) -> Result<PoolReserves, SourceError> {
    let reserved1 = pool_json
        .get("reserved1")
        .and_then(json_decimal)
        .ok_or_else(|| SourceError::ParseError("Missing reserved1 field".to_string()))?;
    let reserved2 = pool_json
        .get("reserved2")
        .and_then(json_decimal)
        .ok_or_else(|| SourceError::ParseError("Missing reserved2 field".to_string()))?;

    Ok(PoolReserves {
        address: required_str(pool_json, "address")?.to_string(),
        token1: TokenAddress::new(required_str(pool_json, "token1")?.to_string()),
        token2: TokenAddress::new(required_str(pool_json, "token2")?.to_string()),
        reserved1,
        reserved2,
    })
}
