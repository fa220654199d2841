pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod orchestration;

pub use config::Config;
pub use datasource::{
    EventSource, MockEventSource, MockPriceOracle, PriceOracle, SourceError, SquidEventSource,
    SquidPriceOracle,
};
pub use db::{init_db, Repository};
pub use domain::{
    Address, Campaign, DailyBalance, Day, Decimal, EventKind, GlobalSettings, LiquidityTransaction,
    LiquidityTxKind, PoolAddress, PoolConfig, PoolEvent, PoolType, Referral, SwapTransaction,
    TimeMs, TokenAddress, UserPoints,
};
pub use engine::{MultiplierConfig, PriceSnapshot};
pub use orchestration::{DailyCycle, EventIngestor, PointsAwarder, Scheduler};
