//! Core domain types for the liquidity accounting and points engine.

pub mod balance;
pub mod decimal;
pub mod event;
pub mod points;
pub mod pool;
pub mod primitives;
pub mod settings;
pub mod transaction;

pub use balance::DailyBalance;
pub use decimal::Decimal;
pub use event::{EventKind, PoolEvent, PoolRef};
pub use points::{Referral, UserPoints};
pub use pool::{Campaign, PoolConfig, PoolReserves, PoolType};
pub use primitives::{Address, Day, PoolAddress, TimeMs, TokenAddress};
pub use settings::{CampaignState, GlobalSettings};
pub use transaction::{LiquidityTransaction, LiquidityTxKind, SwapTransaction};
