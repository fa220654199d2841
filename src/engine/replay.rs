//! Day-level balance replay for one (user, pool) ledger.
//!
//! Transactions must be supplied in (date, created_at) order; callers get
//! that from the repository query. The replay itself is pure.

use crate::domain::{Decimal, LiquidityTransaction, LiquidityTxKind};

/// Result of replaying one day of mint/burn transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// The lowest running balance observed after any step. Equals the
    /// carried-over balance when the day had no transactions.
    pub lowest: Decimal,
    /// The ending balance, seed for the next day's replay.
    pub final_balance: Decimal,
}

/// Replay a day's transactions against the previous day's ending balance.
///
/// Mints add `value_usd`, burns subtract it. Both outputs are clamped to
/// zero; a burn exceeding the tracked balance cannot push it negative.
pub fn replay_day(previous_final: Decimal, transactions: &[LiquidityTransaction]) -> ReplayOutcome {
    let mut current = previous_final;
    let mut lowest: Option<Decimal> = None;

    for tx in transactions {
        current = match tx.kind {
            LiquidityTxKind::Mint => current + tx.value_usd,
            LiquidityTxKind::Burn => current - tx.value_usd,
        };
        lowest = Some(match lowest {
            Some(low) => low.min(current),
            None => current,
        });
    }

    let lowest = lowest.unwrap_or(previous_final);

    ReplayOutcome {
        lowest: lowest.clamp_non_negative(),
        final_balance: current.clamp_non_negative(),
    }
}
