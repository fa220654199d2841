//! Environment-driven configuration.
//!
//! Every constant consumed by the engine (thresholds, multiplier tiers,
//! campaign durations, rate limits) is overridable via environment variables;
//! defaults match the production deployment.

use crate::domain::{Decimal, TokenAddress};
use crate::engine::multiplier::MultiplierConfig;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// GraphQL endpoint serving pool events and pool reserves.
    pub event_source_url: String,
    /// REST endpoint serving the base asset's USD price.
    pub base_price_url: String,
    /// The asset every token is priced against.
    pub base_asset: TokenAddress,
    pub stablecoins: HashSet<TokenAddress>,
    pub ineligible_tokens: HashSet<TokenAddress>,

    // Ingestion
    pub event_page_size: i64,
    pub inter_event_delay_ms: u64,
    pub safe_max_value_usd: Decimal,

    // Price snapshot acceptance
    pub min_base_reserve: Decimal,
    pub min_token_reserve: Decimal,
    pub min_usd_price: Decimal,

    // Daily balance / points
    pub min_liquidity_threshold: Decimal,
    pub multipliers: MultiplierConfig,
    pub swap_fee_rate: Decimal,
    pub points_per_dollar_fee: Decimal,
    /// Fraction of awarded points granted to the referrer.
    pub referrer_bonus_rate: Decimal,
    /// Extra fraction granted to the referred user themself.
    pub referee_bonus_rate: Decimal,

    // Scheduling
    pub ingest_interval_secs: u64,
    pub daily_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub retention_days: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

const DEFAULT_BASE_ASSET: &str = "0x0000000000000000000000000000000001000000";
const DEFAULT_STABLECOINS: &str = "0x7922d8785d93e692bb584e659b607fa821e6a91a";

fn required(map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    map.get(key)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn parse_or_default<T: FromStr>(
    map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError> {
    map.get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "unparseable value".to_string()))
}

fn token_set(map: &HashMap<String, String>, key: &str, default: &str) -> HashSet<TokenAddress> {
    map.get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| TokenAddress::new(s.to_string()))
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = required(&env_map, "DATABASE_PATH")?;
        let event_source_url = required(&env_map, "EVENT_SOURCE_URL")?;
        let base_price_url = required(&env_map, "BASE_PRICE_URL")?;

        let base_asset = TokenAddress::new(
            env_map
                .get("BASE_ASSET_ADDRESS")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_BASE_ASSET)
                .to_string(),
        );

        let multipliers = MultiplierConfig {
            stable_stable_rate: parse_or_default(&env_map, "STABLE_STABLE_RATE", "2.5")?,
            volatile_volatile_rate: parse_or_default(&env_map, "VOLATILE_VOLATILE_RATE", "5")?,
            volatile_stable_rate: parse_or_default(&env_map, "VOLATILE_STABLE_RATE", "10")?,
            duration_days_1_5x: parse_or_default(&env_map, "DURATION_MULTIPLIER_1_5X_DAYS", "7")?,
            duration_days_2x: parse_or_default(&env_map, "DURATION_MULTIPLIER_2X_DAYS", "15")?,
            duration_days_3x: parse_or_default(&env_map, "DURATION_MULTIPLIER_3X_DAYS", "30")?,
            duration_days_4x: parse_or_default(&env_map, "DURATION_MULTIPLIER_4X_DAYS", "60")?,
            duration_days_5x: parse_or_default(&env_map, "DURATION_MULTIPLIER_5X_DAYS", "90")?,
            bootstrapping_duration_days: parse_or_default(
                &env_map,
                "BOOTSTRAPPING_DURATION",
                "14",
            )?,
            early_season_duration_days: parse_or_default(&env_map, "EARLY_SEASON_DURATION", "28")?,
            meme_season_duration_days: parse_or_default(&env_map, "MEME_SEASON_DURATION", "14")?,
        };

        Ok(Config {
            database_path,
            event_source_url,
            base_price_url,
            base_asset,
            stablecoins: token_set(&env_map, "STABLECOIN_ADDRESSES", DEFAULT_STABLECOINS),
            ineligible_tokens: token_set(&env_map, "INELIGIBLE_TOKENS", ""),
            event_page_size: parse_or_default(&env_map, "EVENT_PAGE_SIZE", "50")?,
            inter_event_delay_ms: parse_or_default(&env_map, "EVENT_PROCESSING_DELAY_MS", "250")?,
            safe_max_value_usd: parse_or_default(&env_map, "SAFE_MAX_VALUE_USD", "1000000000000")?,
            min_base_reserve: parse_or_default(&env_map, "MIN_BASE_RESERVE", "100")?,
            min_token_reserve: parse_or_default(&env_map, "MIN_TOKEN_RESERVE", "100")?,
            min_usd_price: parse_or_default(&env_map, "MIN_USD_PRICE", "0.0000001")?,
            min_liquidity_threshold: parse_or_default(&env_map, "MIN_LIQUIDITY_THRESHOLD", "1")?,
            multipliers,
            swap_fee_rate: parse_or_default(&env_map, "SWAP_FEE_RATE", "0.001")?,
            points_per_dollar_fee: parse_or_default(&env_map, "POINTS_PER_DOLLAR_FEE", "200")?,
            referrer_bonus_rate: parse_or_default(&env_map, "REFERRER_BONUS_RATE", "0.10")?,
            referee_bonus_rate: parse_or_default(&env_map, "REFEREE_BONUS_RATE", "0.05")?,
            ingest_interval_secs: parse_or_default(&env_map, "INGEST_INTERVAL_SECS", "60")?,
            daily_interval_secs: parse_or_default(&env_map, "DAILY_INTERVAL_SECS", "86400")?,
            cleanup_interval_secs: parse_or_default(&env_map, "CLEANUP_INTERVAL_SECS", "86400")?,
            retention_days: parse_or_default(&env_map, "RETENTION_DAYS", "30")?,
        })
    }
}
