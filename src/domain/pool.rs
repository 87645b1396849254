//! Lending pools, their rate parameters and point-in-time snapshots.

use crate::domain::activity::ActivityKind;
use crate::domain::amount::dec_str;
use crate::domain::primitives::EventId;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Parameters a pool is created with, as carried by `LendingPoolCreated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCreationParams {
    pub collateral_token: Address,
    pub borrow_token: Address,
    #[serde(with = "dec_str")]
    pub ltv: U256,
    #[serde(with = "dec_str")]
    pub supply_liquidity: U256,
    #[serde(with = "dec_str")]
    pub base_rate: U256,
    #[serde(with = "dec_str")]
    pub rate_at_optimal: U256,
    #[serde(with = "dec_str")]
    pub optimal_utilization: U256,
    #[serde(with = "dec_str")]
    pub max_utilization: U256,
    #[serde(with = "dec_str")]
    pub max_rate: U256,
    #[serde(with = "dec_str")]
    pub liquidation_threshold: U256,
    #[serde(with = "dec_str")]
    pub liquidation_bonus: U256,
}

impl PoolCreationParams {
    pub fn curve(&self) -> RateCurve {
        RateCurve {
            base_rate: self.base_rate,
            rate_at_optimal: self.rate_at_optimal,
            optimal_utilization: self.optimal_utilization,
            max_utilization: self.max_utilization,
            max_rate: self.max_rate,
        }
    }
}

/// Three-segment borrow-rate curve, every value WAD-scaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCurve {
    pub base_rate: U256,
    pub rate_at_optimal: U256,
    pub optimal_utilization: U256,
    pub max_utilization: U256,
    pub max_rate: U256,
}

/// Rate parameters of a router, merged field by field from factory and IRM events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRateParams {
    pub router: Address,
    pub curve: RateCurve,
    pub reserve_factor: U256,
}

/// One independently settable column of [`PoolRateParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateParamField {
    BaseRate,
    RateAtOptimal,
    OptimalUtilization,
    MaxUtilization,
    MaxRate,
    ReserveFactor,
}

impl RateParamField {
    pub const ALL: [RateParamField; 6] = [
        RateParamField::BaseRate,
        RateParamField::RateAtOptimal,
        RateParamField::OptimalUtilization,
        RateParamField::MaxUtilization,
        RateParamField::MaxRate,
        RateParamField::ReserveFactor,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            RateParamField::BaseRate => "base_rate",
            RateParamField::RateAtOptimal => "rate_at_optimal",
            RateParamField::OptimalUtilization => "optimal_utilization",
            RateParamField::MaxUtilization => "max_utilization",
            RateParamField::MaxRate => "max_rate",
            RateParamField::ReserveFactor => "reserve_factor",
        }
    }
}

/// Supply, borrow and collateral totals of one pool at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTotals {
    pub supply: U256,
    pub borrow: U256,
    pub collateral: U256,
}

/// Indexed state of a lending pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingPool {
    pub address: Address,
    pub owner: Option<Address>,
    pub params: PoolCreationParams,
    pub router: Address,
    pub router_implementation: Address,
    pub lending_pool_implementation: Address,
    pub shares_token: Address,
    pub created_at_block: u64,
    pub created_at_timestamp: u64,
    /// Net collateral supplied minus withdrawn through the emitter.
    pub total_collateral: U256,
    /// Totals observed by the last snapshot; `None` until the first one.
    pub last_snapshot: Option<PoolTotals>,
    pub snapshot_version: u64,
}

/// Immutable point-in-time record of a pool's derived financial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub pool: Address,
    pub router: Address,
    pub event_id: EventId,
    pub event_type: ActivityKind,
    pub timestamp: u64,
    pub total_supply_assets: U256,
    pub total_borrow_assets: U256,
    pub total_collateral: U256,
    pub available_liquidity: U256,
    pub utilization: U256,
    pub borrow_rate: U256,
    pub supply_apr: U256,
}

impl PoolSnapshot {
    pub fn totals(&self) -> PoolTotals {
        PoolTotals {
            supply: self.total_supply_assets,
            borrow: self.total_borrow_assets,
            collateral: self.total_collateral,
        }
    }
}
