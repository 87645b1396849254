//! Domain types for the lending-pool indexer.
//!
//! This module provides:
//! - Lossless WAD fixed-point amounts (`U256`/`I256`) and their storage form
//! - Event identity (`EventId`) and the decoded event feed (`ChainEvent`)
//! - Pools, rate parameters, snapshots, user balances and protocol totals
//! - Factory / IRM / emitter configuration records

pub mod activity;
pub mod admin;
pub mod amount;
pub mod balance;
pub mod event;
pub mod pool;
pub mod primitives;
pub mod tvl;

pub use activity::{ActivityKind, ActivityRecord, CollateralEffect, Position};
pub use admin::{FactoryAddressField, FactoryConfig, IrmConfig, FACTORY_ID, IRM_ID};
pub use amount::{parse_i256, parse_u256, AmountParseError, WAD};
pub use balance::{BalanceKind, UserPoolBalance};
pub use event::{ChainEvent, EventKind, EventMeta};
pub use pool::{
    LendingPool, PoolCreationParams, PoolRateParams, PoolSnapshot, PoolTotals, RateCurve,
    RateParamField,
};
pub use primitives::{address_key, hash_key, user_pool_key, EventId};
pub use tvl::{ProtocolTvl, PROTOCOL_TVL_ID};
