//! Per-user running totals within a pool.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six running-total counters of a [`UserPoolBalance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceKind {
    Supplied,
    Withdrawn,
    Borrowed,
    Repaid,
    CollateralSupplied,
    CollateralWithdrawn,
}

impl BalanceKind {
    pub const ALL: [BalanceKind; 6] = [
        BalanceKind::Supplied,
        BalanceKind::Withdrawn,
        BalanceKind::Borrowed,
        BalanceKind::Repaid,
        BalanceKind::CollateralSupplied,
        BalanceKind::CollateralWithdrawn,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            BalanceKind::Supplied => "total_supplied",
            BalanceKind::Withdrawn => "total_withdrawn",
            BalanceKind::Borrowed => "total_borrowed",
            BalanceKind::Repaid => "total_repaid",
            BalanceKind::CollateralSupplied => "total_collateral_supplied",
            BalanceKind::CollateralWithdrawn => "total_collateral_withdrawn",
        }
    }
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Running totals for one `(user, pool)` pair. Counters only ever grow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPoolBalance {
    pub user: Address,
    pub pool: Address,
    pub total_supplied: U256,
    pub total_withdrawn: U256,
    pub total_borrowed: U256,
    pub total_repaid: U256,
    pub total_collateral_supplied: U256,
    pub total_collateral_withdrawn: U256,
}

impl UserPoolBalance {
    /// All counters zero.
    pub fn empty(user: Address, pool: Address) -> Self {
        UserPoolBalance {
            user,
            pool,
            total_supplied: U256::ZERO,
            total_withdrawn: U256::ZERO,
            total_borrowed: U256::ZERO,
            total_repaid: U256::ZERO,
            total_collateral_supplied: U256::ZERO,
            total_collateral_withdrawn: U256::ZERO,
        }
    }

    pub fn get(&self, kind: BalanceKind) -> U256 {
        match kind {
            BalanceKind::Supplied => self.total_supplied,
            BalanceKind::Withdrawn => self.total_withdrawn,
            BalanceKind::Borrowed => self.total_borrowed,
            BalanceKind::Repaid => self.total_repaid,
            BalanceKind::CollateralSupplied => self.total_collateral_supplied,
            BalanceKind::CollateralWithdrawn => self.total_collateral_withdrawn,
        }
    }

    fn counter_mut(&mut self, kind: BalanceKind) -> &mut U256 {
        match kind {
            BalanceKind::Supplied => &mut self.total_supplied,
            BalanceKind::Withdrawn => &mut self.total_withdrawn,
            BalanceKind::Borrowed => &mut self.total_borrowed,
            BalanceKind::Repaid => &mut self.total_repaid,
            BalanceKind::CollateralSupplied => &mut self.total_collateral_supplied,
            BalanceKind::CollateralWithdrawn => &mut self.total_collateral_withdrawn,
        }
    }

    /// Add `amount` to exactly one counter, leaving the others untouched.
    ///
    /// Returns the new counter value, or `None` on overflow (nothing is changed).
    pub fn accumulate(&mut self, kind: BalanceKind, amount: U256) -> Option<U256> {
        let counter = self.counter_mut(kind);
        let next = counter.checked_add(amount)?;
        *counter = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance() -> UserPoolBalance {
        UserPoolBalance::empty(Address::repeat_byte(1), Address::repeat_byte(2))
    }

    #[test]
    fn test_accumulate_touches_only_target_counter() {
        let mut b = balance();
        b.accumulate(BalanceKind::Borrowed, U256::from(40u64)).unwrap();

        for kind in BalanceKind::ALL {
            let expected = if kind == BalanceKind::Borrowed { 40u64 } else { 0 };
            assert_eq!(b.get(kind), U256::from(expected), "counter {kind}");
        }
    }

    #[test]
    fn test_accumulate_split_equals_single() {
        let mut split = balance();
        split.accumulate(BalanceKind::Repaid, U256::from(7u64)).unwrap();
        split.accumulate(BalanceKind::Repaid, U256::from(5u64)).unwrap();

        let mut single = balance();
        single.accumulate(BalanceKind::Repaid, U256::from(12u64)).unwrap();

        assert_eq!(split, single);
    }

    #[test]
    fn test_accumulate_overflow_leaves_counter() {
        let mut b = balance();
        b.accumulate(BalanceKind::Supplied, U256::MAX).unwrap();
        assert_eq!(b.accumulate(BalanceKind::Supplied, U256::from(1u64)), None);
        assert_eq!(b.total_supplied, U256::MAX);
    }
}
