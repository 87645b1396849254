//! Protocol-wide totals across all pools.

use alloy_primitives::I256;

/// Singleton id of the [`ProtocolTvl`] row.
pub const PROTOCOL_TVL_ID: &str = "global";

/// Running protocol totals, advanced by per-snapshot deltas.
///
/// Signed because a delta reconciled against a stale baseline can
/// temporarily take a total below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTvl {
    pub total_supply_assets: I256,
    pub total_borrow_assets: I256,
    pub total_collateral: I256,
    /// Pools that have produced at least one snapshot.
    pub pool_count: u64,
    pub last_updated_at: u64,
}
