use crate::datasource::{ContractReader, ReadError, RouterView};
use crate::db::{Repository, SnapshotCommit, SnapshotReading};
use crate::domain::{ActivityKind, EventId, PoolSnapshot};
use crate::engine::{borrow_rate, supply_apr, utilization};
use crate::error::IndexerError;
use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::warn;

/// Result of one snapshot attempt.
///
/// The skip variants are recoverable: nothing was written and the next
/// liquidity event of the pool takes a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Written(PoolSnapshot),
    SkippedMissingPool,
    SkippedReadFailure(ReadError),
}

impl SnapshotOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, SnapshotOutcome::Written(_))
    }
}

/// Captures a pool's live state after a liquidity-moving event.
#[derive(Clone)]
pub struct SnapshotBuilder {
    repo: Arc<Repository>,
    reader: Arc<dyn ContractReader>,
    default_reserve_factor: U256,
}

impl SnapshotBuilder {
    pub fn new(
        repo: Arc<Repository>,
        reader: Arc<dyn ContractReader>,
        default_reserve_factor: U256,
    ) -> Self {
        Self {
            repo,
            reader,
            default_reserve_factor,
        }
    }

    /// Read the pool router's totals, derive rates and commit the snapshot
    /// together with its protocol TVL delta.
    ///
    /// Live reads run concurrently and outside any database transaction.
    pub async fn build_snapshot(
        &self,
        pool: &Address,
        event_type: ActivityKind,
        event_id: EventId,
        timestamp: u64,
    ) -> Result<SnapshotOutcome, IndexerError> {
        let Some(record) = self.repo.get_pool(pool).await? else {
            warn!(pool = %pool, id = %event_id, "snapshot skipped: pool not indexed");
            return Ok(SnapshotOutcome::SkippedMissingPool);
        };
        let router = record.router;

        let reads = tokio::try_join!(
            self.reader.read(router, RouterView::TotalSupplyAssets),
            self.reader.read(router, RouterView::TotalBorrowAssets),
        );
        let (total_supply, total_borrow) = match reads {
            Ok(totals) => totals,
            Err(e) => {
                warn!(pool = %pool, router = %router, id = %event_id, error = %e, "snapshot skipped: live read failed");
                return Ok(SnapshotOutcome::SkippedReadFailure(e));
            }
        };

        let params = self.repo.get_rate_params(&router).await?;
        let utilization = utilization(total_supply, total_borrow)?;
        let borrow_rate = match &params {
            Some(params) => borrow_rate(total_supply, total_borrow, &params.curve)?,
            None => U256::ZERO,
        };
        let supply_apr = if total_supply.is_zero() {
            U256::ZERO
        } else {
            let reserve_factor = params
                .as_ref()
                .map_or(self.default_reserve_factor, |p| p.reserve_factor);
            supply_apr(borrow_rate, utilization, reserve_factor)?
        };

        let reading = SnapshotReading {
            pool: *pool,
            router,
            event_id,
            event_type,
            timestamp,
            total_supply_assets: total_supply,
            total_borrow_assets: total_borrow,
            utilization,
            borrow_rate,
            supply_apr,
        };

        match self.repo.commit_snapshot(&reading).await? {
            SnapshotCommit::Written(snapshot) => Ok(SnapshotOutcome::Written(snapshot)),
            SnapshotCommit::MissingPool => {
                warn!(pool = %pool, id = %event_id, "snapshot skipped: pool vanished before commit");
                Ok(SnapshotOutcome::SkippedMissingPool)
            }
        }
    }
}
