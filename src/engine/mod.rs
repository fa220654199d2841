//! Pure computation engines for deterministic ledger and points logic.

pub mod multiplier;
pub mod prices;
pub mod replay;

pub use multiplier::MultiplierConfig;
pub use prices::{PriceSnapshot, SnapshotLimits};
pub use replay::{replay_day, ReplayOutcome};
