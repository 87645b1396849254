//! Decoded on-chain events as delivered by the ingestion feed.
//!
//! A [`ChainEvent`] pairs the log position and transaction context
//! ([`EventMeta`]) with the decoded arguments ([`EventKind`]). The JSON form
//! is `{"meta": {...}, "event": "<Kind>", "args": {...}}` with amounts as
//! decimal or hex strings.

use crate::domain::activity::{ActivityKind, ActivityRecord};
use crate::domain::admin::FactoryAddressField;
use crate::domain::amount::dec_str;
use crate::domain::pool::{PoolCreationParams, RateParamField};
use crate::domain::primitives::EventId;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Log position and transaction context of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub block_number: u64,
    pub log_index: u64,
    /// Block timestamp in seconds.
    pub timestamp: u64,
    pub tx_hash: B256,
    /// Destination of the transaction; the pool for emitter activity events.
    #[serde(default)]
    pub tx_to: Option<Address>,
    /// Contract that emitted the log.
    pub address: Address,
}

impl EventMeta {
    pub fn event_id(&self) -> EventId {
        EventId::new(self.block_number, self.log_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub meta: EventMeta,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "args")]
pub enum EventKind {
    // Pool factory
    FactorySetup,
    FactoryOwnershipTransferred {
        new_owner: Address,
    },
    LendingPoolCreated {
        params: PoolCreationParams,
        router: Address,
        router_implementation: Address,
        lending_pool: Address,
        lending_pool_implementation: Address,
        shares_token: Address,
    },
    OperatorSet {
        operator: Address,
        status: bool,
    },
    OftAddressSet {
        token: Address,
        oft_address: Address,
    },
    FactoryAddressSet {
        field: FactoryAddressField,
        value: Address,
    },
    MinAmountSupplyLiquiditySet {
        token: Address,
        #[serde(with = "dec_str")]
        amount: U256,
    },
    ChainIdToEidSet {
        #[serde(with = "dec_str")]
        chain_id: U256,
        eid: u32,
    },
    CreatorFeeSet {
        router: Address,
        #[serde(with = "dec_str")]
        fee: U256,
    },
    Paused,
    Unpaused,

    // Lending pool
    PoolOwnershipTransferred {
        new_owner: Address,
    },

    // Emitter
    EmitterOwnershipTransferred {
        new_owner: Address,
    },
    PositionCreated {
        position: Address,
        lending_pool: Address,
        router: Address,
        user: Address,
    },
    SharesTokenDeployed {
        shares_token: Address,
        router: Address,
    },
    SupplyLiquidity {
        user: Address,
        #[serde(with = "dec_str")]
        amount: U256,
        #[serde(with = "dec_str")]
        shares: U256,
    },
    WithdrawLiquidity {
        user: Address,
        #[serde(with = "dec_str")]
        amount: U256,
        #[serde(with = "dec_str")]
        shares: U256,
    },
    SupplyCollateral {
        position: Address,
        user: Address,
        #[serde(with = "dec_str")]
        amount: U256,
    },
    BorrowDebt {
        user: Address,
        #[serde(with = "dec_str")]
        protocol_fee: U256,
        #[serde(with = "dec_str")]
        user_amount: U256,
        #[serde(with = "dec_str")]
        shares: U256,
        #[serde(with = "dec_str")]
        amount: U256,
    },
    RepayByPosition {
        user: Address,
        #[serde(with = "dec_str")]
        amount: U256,
        #[serde(with = "dec_str")]
        shares: U256,
    },
    WithdrawCollateral {
        user: Address,
        #[serde(with = "dec_str")]
        amount: U256,
    },
    AdminGranted {
        account: Address,
    },
    AdminRevoked {
        account: Address,
    },

    // Interest rate model
    IrmSetup,
    IrmOwnershipTransferred {
        new_owner: Address,
    },
    ScaledPercentageSet {
        #[serde(with = "dec_str")]
        percentage: U256,
    },
    /// A single rate-curve field of the router `router` changed.
    RateParamSet {
        router: Address,
        field: RateParamField,
        #[serde(with = "dec_str")]
        value: U256,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::FactorySetup => "FactorySetup",
            EventKind::FactoryOwnershipTransferred { .. } => "FactoryOwnershipTransferred",
            EventKind::LendingPoolCreated { .. } => "LendingPoolCreated",
            EventKind::OperatorSet { .. } => "OperatorSet",
            EventKind::OftAddressSet { .. } => "OftAddressSet",
            EventKind::FactoryAddressSet { .. } => "FactoryAddressSet",
            EventKind::MinAmountSupplyLiquiditySet { .. } => "MinAmountSupplyLiquiditySet",
            EventKind::ChainIdToEidSet { .. } => "ChainIdToEidSet",
            EventKind::CreatorFeeSet { .. } => "CreatorFeeSet",
            EventKind::Paused => "Paused",
            EventKind::Unpaused => "Unpaused",
            EventKind::PoolOwnershipTransferred { .. } => "PoolOwnershipTransferred",
            EventKind::EmitterOwnershipTransferred { .. } => "EmitterOwnershipTransferred",
            EventKind::PositionCreated { .. } => "PositionCreated",
            EventKind::SharesTokenDeployed { .. } => "SharesTokenDeployed",
            EventKind::SupplyLiquidity { .. } => "SupplyLiquidity",
            EventKind::WithdrawLiquidity { .. } => "WithdrawLiquidity",
            EventKind::SupplyCollateral { .. } => "SupplyCollateral",
            EventKind::BorrowDebt { .. } => "BorrowDebt",
            EventKind::RepayByPosition { .. } => "RepayByPosition",
            EventKind::WithdrawCollateral { .. } => "WithdrawCollateral",
            EventKind::AdminGranted { .. } => "AdminGranted",
            EventKind::AdminRevoked { .. } => "AdminRevoked",
            EventKind::IrmSetup => "IrmSetup",
            EventKind::IrmOwnershipTransferred { .. } => "IrmOwnershipTransferred",
            EventKind::ScaledPercentageSet { .. } => "ScaledPercentageSet",
            EventKind::RateParamSet { .. } => "RateParamSet",
        }
    }

    pub fn activity_kind(&self) -> Option<ActivityKind> {
        match self {
            EventKind::SupplyLiquidity { .. } => Some(ActivityKind::SupplyLiquidity),
            EventKind::WithdrawLiquidity { .. } => Some(ActivityKind::WithdrawLiquidity),
            EventKind::SupplyCollateral { .. } => Some(ActivityKind::SupplyCollateral),
            EventKind::BorrowDebt { .. } => Some(ActivityKind::BorrowDebt),
            EventKind::RepayByPosition { .. } => Some(ActivityKind::RepayByPosition),
            EventKind::WithdrawCollateral { .. } => Some(ActivityKind::WithdrawCollateral),
            _ => None,
        }
    }
}

impl ChainEvent {
    /// Build the immutable activity record for an emitter activity event.
    ///
    /// `None` for non-activity events and for activity events whose
    /// transaction destination (the pool) is unknown.
    pub fn activity_record(&self) -> Option<ActivityRecord> {
        let kind = self.kind.activity_kind()?;
        let pool = self.meta.tx_to?;
        let mut record = ActivityRecord {
            kind,
            id: self.meta.event_id(),
            pool,
            user: Address::ZERO,
            amount: U256::ZERO,
            shares: None,
            position: None,
            protocol_fee: None,
            user_amount: None,
            timestamp: self.meta.timestamp,
            tx_hash: self.meta.tx_hash,
        };
        match &self.kind {
            EventKind::SupplyLiquidity {
                user,
                amount,
                shares,
            }
            | EventKind::WithdrawLiquidity {
                user,
                amount,
                shares,
            }
            | EventKind::RepayByPosition {
                user,
                amount,
                shares,
            } => {
                record.user = *user;
                record.amount = *amount;
                record.shares = Some(*shares);
            }
            EventKind::SupplyCollateral {
                position,
                user,
                amount,
            } => {
                record.user = *user;
                record.amount = *amount;
                record.position = Some(*position);
            }
            EventKind::BorrowDebt {
                user,
                protocol_fee,
                user_amount,
                shares,
                amount,
            } => {
                record.user = *user;
                record.amount = *amount;
                record.shares = Some(*shares);
                record.protocol_fee = Some(*protocol_fee);
                record.user_amount = Some(*user_amount);
            }
            EventKind::WithdrawCollateral { user, amount } => {
                record.user = *user;
                record.amount = *amount;
            }
            _ => return None,
        }
        Some(record)
    }

    /// The pool whose state this event touches, if it touches exactly one.
    ///
    /// Events of the same pool must be applied in feed order; events without
    /// a pool (configuration, rate parameters) may affect any pool.
    pub fn pool_partition(&self) -> Option<Address> {
        match &self.kind {
            EventKind::LendingPoolCreated { .. } => None,
            EventKind::PoolOwnershipTransferred { .. } => Some(self.meta.address),
            EventKind::PositionCreated { lending_pool, .. } => Some(*lending_pool),
            _ if self.kind.activity_kind().is_some() => self.meta.tx_to,
            _ => None,
        }
    }
}
