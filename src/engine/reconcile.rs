//! Reconciliation of pool snapshots against protocol-wide totals.

use crate::domain::amount::to_signed;
use crate::domain::{PoolTotals, ProtocolTvl};
use alloy_primitives::I256;

/// Signed change of one pool's totals since its previous snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TvlDelta {
    pub supply: I256,
    pub borrow: I256,
    pub collateral: I256,
}

impl TvlDelta {
    /// Change from `previous` to `current`.
    ///
    /// With no previous snapshot the current totals are the baseline, so the
    /// delta is the full current value. `None` if a total does not fit `I256`.
    pub fn between(current: &PoolTotals, previous: Option<&PoolTotals>) -> Option<Self> {
        let previous = previous.copied().unwrap_or_default();
        Some(TvlDelta {
            supply: to_signed(current.supply)?.checked_sub(to_signed(previous.supply)?)?,
            borrow: to_signed(current.borrow)?.checked_sub(to_signed(previous.borrow)?)?,
            collateral: to_signed(current.collateral)?
                .checked_sub(to_signed(previous.collateral)?)?,
        })
    }

    /// Delta with every negative component clamped to zero.
    pub fn positive_part(&self) -> Self {
        let clamp = |v: I256| if v.is_negative() { I256::ZERO } else { v };
        TvlDelta {
            supply: clamp(self.supply),
            borrow: clamp(self.borrow),
            collateral: clamp(self.collateral),
        }
    }
}

/// Apply a pool's delta to the protocol totals.
///
/// The very first row is seeded from the positive part of the delta only, so
/// the protocol never starts out negative. Later deltas are added as-is
/// (withdrawals and repayments are negative). `first_observation` marks the
/// pool's first snapshot and bumps the pool count. `None` on overflow.
pub fn apply_delta(
    existing: Option<&ProtocolTvl>,
    delta: &TvlDelta,
    first_observation: bool,
    timestamp: u64,
) -> Option<ProtocolTvl> {
    let new_pools = u64::from(first_observation);
    match existing {
        None => {
            let seed = delta.positive_part();
            Some(ProtocolTvl {
                total_supply_assets: seed.supply,
                total_borrow_assets: seed.borrow,
                total_collateral: seed.collateral,
                pool_count: new_pools,
                last_updated_at: timestamp,
            })
        }
        Some(tvl) => Some(ProtocolTvl {
            total_supply_assets: tvl.total_supply_assets.checked_add(delta.supply)?,
            total_borrow_assets: tvl.total_borrow_assets.checked_add(delta.borrow)?,
            total_collateral: tvl.total_collateral.checked_add(delta.collateral)?,
            pool_count: tvl.pool_count.checked_add(new_pools)?,
            last_updated_at: timestamp,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn totals(supply: u64, borrow: u64, collateral: u64) -> PoolTotals {
        PoolTotals {
            supply: U256::from(supply),
            borrow: U256::from(borrow),
            collateral: U256::from(collateral),
        }
    }

    fn signed(v: i64) -> I256 {
        I256::try_from(v).unwrap()
    }

    #[test]
    fn test_first_observation_is_full_value() {
        let delta = TvlDelta::between(&totals(1000, 400, 50), None).unwrap();
        assert_eq!(delta.supply, signed(1000));
        assert_eq!(delta.borrow, signed(400));
        assert_eq!(delta.collateral, signed(50));
    }

    #[test]
    fn test_delta_can_be_negative() {
        let delta =
            TvlDelta::between(&totals(700, 400, 50), Some(&totals(1000, 300, 50))).unwrap();
        assert_eq!(delta.supply, signed(-300));
        assert_eq!(delta.borrow, signed(100));
        assert_eq!(delta.collateral, I256::ZERO);
    }

    #[test]
    fn test_seed_clamps_negative_components() {
        let delta = TvlDelta {
            supply: signed(500),
            borrow: signed(-20),
            collateral: signed(7),
        };
        let tvl = apply_delta(None, &delta, true, 42).unwrap();
        assert_eq!(tvl.total_supply_assets, signed(500));
        assert_eq!(tvl.total_borrow_assets, I256::ZERO);
        assert_eq!(tvl.total_collateral, signed(7));
        assert_eq!(tvl.pool_count, 1);
        assert_eq!(tvl.last_updated_at, 42);
    }

    #[test]
    fn test_existing_totals_take_signed_delta() {
        let existing = ProtocolTvl {
            total_supply_assets: signed(1000),
            total_borrow_assets: signed(400),
            total_collateral: signed(0),
            pool_count: 2,
            last_updated_at: 1,
        };
        let delta = TvlDelta {
            supply: signed(-300),
            borrow: signed(-400),
            collateral: signed(10),
        };
        let tvl = apply_delta(Some(&existing), &delta, false, 9).unwrap();
        assert_eq!(tvl.total_supply_assets, signed(700));
        assert_eq!(tvl.total_borrow_assets, I256::ZERO);
        assert_eq!(tvl.total_collateral, signed(10));
        assert_eq!(tvl.pool_count, 2);
        assert_eq!(tvl.last_updated_at, 9);
    }

    #[test]
    fn test_oversized_total_is_rejected() {
        assert!(TvlDelta::between(
            &PoolTotals {
                supply: U256::MAX,
                ..PoolTotals::default()
            },
            None
        )
        .is_none());
    }
}
