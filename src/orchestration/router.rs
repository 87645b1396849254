use crate::datasource::ContractReader;
use crate::db::Repository;
use crate::domain::{ChainEvent, EventKind, LendingPool, Position};
use crate::error::IndexerError;
use crate::orchestration::snapshot::{SnapshotBuilder, SnapshotOutcome};
use alloy_primitives::U256;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What dispatching one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: &'static str,
    /// `false` when the event was deliberately ignored or its target was unknown.
    pub applied: bool,
    pub snapshot: Option<SnapshotOutcome>,
}

impl DispatchReport {
    fn new(event: &'static str, applied: bool) -> Self {
        Self {
            event,
            applied,
            snapshot: None,
        }
    }
}

/// Routes decoded chain events to their storage effects.
///
/// Activity events run in a fixed order: record the event and accumulate
/// the user balance (one transaction), then snapshot the pool if the event
/// moved supply or borrow totals.
#[derive(Clone)]
pub struct EventRouter {
    repo: Arc<Repository>,
    snapshots: SnapshotBuilder,
    default_reserve_factor: U256,
}

impl EventRouter {
    pub fn new(
        repo: Arc<Repository>,
        reader: Arc<dyn ContractReader>,
        default_reserve_factor: U256,
    ) -> Self {
        let snapshots = SnapshotBuilder::new(repo.clone(), reader, default_reserve_factor);
        Self {
            repo,
            snapshots,
            default_reserve_factor,
        }
    }

    pub async fn dispatch(&self, event: &ChainEvent) -> Result<DispatchReport, IndexerError> {
        let name = event.kind.name();
        let meta = &event.meta;
        debug!(event = name, id = %meta.event_id(), "dispatching");

        let applied = match &event.kind {
            EventKind::FactorySetup => {
                self.repo.ensure_factory().await?;
                true
            }
            EventKind::FactoryOwnershipTransferred { new_owner } => {
                self.repo.set_factory_owner(new_owner).await?;
                true
            }
            EventKind::LendingPoolCreated {
                params,
                router,
                router_implementation,
                lending_pool,
                lending_pool_implementation,
                shares_token,
            } => {
                let pool = LendingPool {
                    address: *lending_pool,
                    owner: None,
                    params: params.clone(),
                    router: *router,
                    router_implementation: *router_implementation,
                    lending_pool_implementation: *lending_pool_implementation,
                    shares_token: *shares_token,
                    created_at_block: meta.block_number,
                    created_at_timestamp: meta.timestamp,
                    total_collateral: U256::ZERO,
                    last_snapshot: None,
                    snapshot_version: 0,
                };
                self.repo
                    .create_pool(&pool, self.default_reserve_factor)
                    .await?;
                info!(pool = %lending_pool, router = %router, "lending pool created");
                true
            }
            EventKind::OperatorSet { operator, status } => {
                self.repo.set_operator(operator, *status).await?;
                true
            }
            EventKind::OftAddressSet { token, oft_address } => {
                self.repo.set_oft_address(token, oft_address).await?;
                true
            }
            EventKind::FactoryAddressSet { field, value } => {
                self.repo.set_factory_address(*field, value).await?;
                true
            }
            EventKind::MinAmountSupplyLiquiditySet { token, amount } => {
                self.repo.set_min_supply(token, *amount).await?;
                true
            }
            EventKind::ChainIdToEidSet { chain_id, eid } => {
                self.repo.set_chain_eid(*chain_id, *eid).await?;
                true
            }
            EventKind::CreatorFeeSet { router, fee } => {
                self.repo.set_creator_fee(router, *fee).await?;
                true
            }
            EventKind::Paused => {
                self.repo.set_factory_paused(true).await?;
                true
            }
            EventKind::Unpaused => {
                self.repo.set_factory_paused(false).await?;
                true
            }
            EventKind::PoolOwnershipTransferred { new_owner } => {
                let updated = self.repo.update_pool_owner(&meta.address, new_owner).await?;
                if !updated {
                    debug!(pool = %meta.address, "ownership transfer for unindexed pool ignored");
                }
                updated
            }
            EventKind::EmitterOwnershipTransferred { .. } => false,
            EventKind::PositionCreated {
                position,
                lending_pool,
                router,
                user,
            } => {
                self.repo
                    .insert_position(&Position {
                        address: *position,
                        pool: *lending_pool,
                        router: *router,
                        user: *user,
                        created_at_block: meta.block_number,
                        created_at_timestamp: meta.timestamp,
                    })
                    .await?;
                true
            }
            EventKind::SharesTokenDeployed {
                shares_token,
                router,
            } => {
                self.repo.insert_shares_token(shares_token, router).await?;
                true
            }
            EventKind::SupplyLiquidity { .. }
            | EventKind::WithdrawLiquidity { .. }
            | EventKind::SupplyCollateral { .. }
            | EventKind::BorrowDebt { .. }
            | EventKind::RepayByPosition { .. }
            | EventKind::WithdrawCollateral { .. } => return self.dispatch_activity(event).await,
            EventKind::AdminGranted { account } => {
                self.repo.set_emitter_admin(account, true).await?;
                true
            }
            EventKind::AdminRevoked { account } => {
                self.repo.set_emitter_admin(account, false).await?;
                true
            }
            EventKind::IrmSetup => {
                self.repo.ensure_irm().await?;
                true
            }
            EventKind::IrmOwnershipTransferred { new_owner } => {
                self.repo.set_irm_owner(new_owner).await?;
                true
            }
            EventKind::ScaledPercentageSet { percentage } => {
                self.repo.set_scaled_percentage(*percentage).await?;
                true
            }
            EventKind::RateParamSet {
                router,
                field,
                value,
            } => {
                self.repo
                    .set_rate_param(router, *field, *value, self.default_reserve_factor)
                    .await?;
                true
            }
        };

        Ok(DispatchReport::new(name, applied))
    }

    async fn dispatch_activity(&self, event: &ChainEvent) -> Result<DispatchReport, IndexerError> {
        let name = event.kind.name();
        let Some(record) = event.activity_record() else {
            warn!(
                event = name,
                id = %event.meta.event_id(),
                tx = %event.meta.tx_hash,
                "activity event without transaction destination skipped"
            );
            return Ok(DispatchReport::new(name, false));
        };

        self.repo.record_activity(&record).await?;

        let snapshot = if record.kind.moves_liquidity() {
            let outcome = self
                .snapshots
                .build_snapshot(&record.pool, record.kind, record.id, record.timestamp)
                .await?;
            Some(outcome)
        } else {
            None
        };

        Ok(DispatchReport {
            event: name,
            applied: true,
            snapshot,
        })
    }
}
