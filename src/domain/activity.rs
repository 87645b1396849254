//! Emitter activity events: the liquidity, debt and collateral movements of a user.

use crate::domain::balance::BalanceKind;
use crate::domain::primitives::EventId;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of user activity reported by the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    SupplyLiquidity,
    WithdrawLiquidity,
    SupplyCollateral,
    BorrowDebt,
    RepayByPosition,
    WithdrawCollateral,
}

/// How an activity moves the pool's collateral total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollateralEffect {
    Deposit,
    Release,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::SupplyLiquidity => "SupplyLiquidity",
            ActivityKind::WithdrawLiquidity => "WithdrawLiquidity",
            ActivityKind::SupplyCollateral => "SupplyCollateral",
            ActivityKind::BorrowDebt => "BorrowDebt",
            ActivityKind::RepayByPosition => "RepayByPosition",
            ActivityKind::WithdrawCollateral => "WithdrawCollateral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SupplyLiquidity" => Some(ActivityKind::SupplyLiquidity),
            "WithdrawLiquidity" => Some(ActivityKind::WithdrawLiquidity),
            "SupplyCollateral" => Some(ActivityKind::SupplyCollateral),
            "BorrowDebt" => Some(ActivityKind::BorrowDebt),
            "RepayByPosition" => Some(ActivityKind::RepayByPosition),
            "WithdrawCollateral" => Some(ActivityKind::WithdrawCollateral),
            _ => None,
        }
    }

    /// Table holding the immutable per-event records of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            ActivityKind::SupplyLiquidity => "supply_liquidity_events",
            ActivityKind::WithdrawLiquidity => "withdraw_liquidity_events",
            ActivityKind::SupplyCollateral => "supply_collateral_events",
            ActivityKind::BorrowDebt => "borrow_debt_events",
            ActivityKind::RepayByPosition => "repay_by_position_events",
            ActivityKind::WithdrawCollateral => "withdraw_collateral_events",
        }
    }

    /// Running total the activity's amount is accumulated into.
    pub fn balance_kind(&self) -> BalanceKind {
        match self {
            ActivityKind::SupplyLiquidity => BalanceKind::Supplied,
            ActivityKind::WithdrawLiquidity => BalanceKind::Withdrawn,
            ActivityKind::SupplyCollateral => BalanceKind::CollateralSupplied,
            ActivityKind::BorrowDebt => BalanceKind::Borrowed,
            ActivityKind::RepayByPosition => BalanceKind::Repaid,
            ActivityKind::WithdrawCollateral => BalanceKind::CollateralWithdrawn,
        }
    }

    /// Whether the activity changes the router's supply or borrow totals
    /// and therefore warrants a pool snapshot.
    pub fn moves_liquidity(&self) -> bool {
        matches!(
            self,
            ActivityKind::SupplyLiquidity
                | ActivityKind::WithdrawLiquidity
                | ActivityKind::BorrowDebt
                | ActivityKind::RepayByPosition
        )
    }

    pub fn collateral_effect(&self) -> Option<CollateralEffect> {
        match self {
            ActivityKind::SupplyCollateral => Some(CollateralEffect::Deposit),
            ActivityKind::WithdrawCollateral => Some(CollateralEffect::Release),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one activity event, keyed by its [`EventId`].
///
/// Optional fields are only carried by some kinds: `shares` by liquidity
/// and debt events, `position` by `SupplyCollateral`, `protocol_fee` and
/// `user_amount` by `BorrowDebt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub id: EventId,
    pub pool: Address,
    pub user: Address,
    pub amount: U256,
    pub shares: Option<U256>,
    pub position: Option<Address>,
    pub protocol_fee: Option<U256>,
    pub user_amount: Option<U256>,
    pub timestamp: u64,
    pub tx_hash: B256,
}

/// Borrower position contract opened against a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub address: Address,
    pub pool: Address,
    pub router: Address,
    pub user: Address,
    pub created_at_block: u64,
    pub created_at_timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ActivityKind; 6] = [
        ActivityKind::SupplyLiquidity,
        ActivityKind::WithdrawLiquidity,
        ActivityKind::SupplyCollateral,
        ActivityKind::BorrowDebt,
        ActivityKind::RepayByPosition,
        ActivityKind::WithdrawCollateral,
    ];

    #[test]
    fn test_parse_roundtrip() {
        for kind in ALL {
            assert_eq!(ActivityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ActivityKind::parse("Liquidate"), None);
    }

    #[test]
    fn test_collateral_events_do_not_move_liquidity() {
        for kind in ALL {
            assert_eq!(
                kind.moves_liquidity(),
                kind.collateral_effect().is_none(),
                "{kind}"
            );
        }
    }

    #[test]
    fn test_each_kind_has_its_own_counter() {
        let mut kinds: Vec<_> = ALL.iter().map(|k| k.balance_kind().column()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), ALL.len());
    }
}
