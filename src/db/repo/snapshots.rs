//! Pool snapshots and protocol TVL reconciliation.

use crate::domain::{
    address_key, ActivityKind, EventId, LendingPool, PoolSnapshot, ProtocolTvl, PROTOCOL_TVL_ID,
};
use crate::engine::{apply_delta, TvlDelta};
use crate::error::IndexerError;
use alloy_primitives::{Address, U256};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::debug;

use super::{address_col, db_int, get_pool_in, i256_col, u256_col, u64_col, Repository};

/// Live router totals and the rates derived from them, taken outside any
/// transaction and handed to [`Repository::commit_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReading {
    pub pool: Address,
    pub router: Address,
    pub event_id: EventId,
    pub event_type: ActivityKind,
    pub timestamp: u64,
    pub total_supply_assets: U256,
    pub total_borrow_assets: U256,
    pub utilization: U256,
    pub borrow_rate: U256,
    pub supply_apr: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotCommit {
    Written(PoolSnapshot),
    /// The pool row disappeared or never existed; nothing was written.
    MissingPool,
}

impl Repository {
    /// Persist a snapshot, reconcile its delta into the protocol TVL and
    /// refresh the pool's snapshot cache, atomically.
    ///
    /// The transaction opens by bumping the pool's `snapshot_version`, so it
    /// holds the write lock before the cached totals are read. Concurrent
    /// snapshots of the same pool (or any pool, for the TVL row) therefore
    /// serialize instead of reconciling against a stale cache.
    ///
    /// # Errors
    /// [`IndexerError::DuplicateKey`] if a snapshot already exists for this
    /// pool and event; no TVL or cache change is made in that case.
    pub async fn commit_snapshot(
        &self,
        reading: &SnapshotReading,
    ) -> Result<SnapshotCommit, IndexerError> {
        let pool_key = address_key(&reading.pool);
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query(
            "UPDATE lending_pools SET snapshot_version = snapshot_version + 1 WHERE id = ?",
        )
        .bind(&pool_key)
        .execute(&mut *tx)
        .await?;
        if bumped.rows_affected() == 0 {
            return Ok(SnapshotCommit::MissingPool);
        }
        let Some(pool) = get_pool_in(&mut *tx, &reading.pool).await? else {
            return Ok(SnapshotCommit::MissingPool);
        };

        let snapshot = PoolSnapshot {
            pool: reading.pool,
            router: reading.router,
            event_id: reading.event_id,
            event_type: reading.event_type,
            timestamp: reading.timestamp,
            total_supply_assets: reading.total_supply_assets,
            total_borrow_assets: reading.total_borrow_assets,
            total_collateral: pool.total_collateral,
            available_liquidity: reading
                .total_supply_assets
                .saturating_sub(reading.total_borrow_assets),
            utilization: reading.utilization,
            borrow_rate: reading.borrow_rate,
            supply_apr: reading.supply_apr,
        };
        insert_snapshot_in(&mut *tx, &snapshot).await?;

        let tvl = reconcile_tvl_in(&mut *tx, &pool, &snapshot).await?;
        update_cache_in(&mut *tx, &snapshot).await?;

        tx.commit().await?;
        debug!(
            pool = %pool_key,
            id = %snapshot.event_id,
            supply = %snapshot.total_supply_assets,
            borrow = %snapshot.total_borrow_assets,
            tvl_supply = %tvl.total_supply_assets,
            "snapshot committed"
        );
        Ok(SnapshotCommit::Written(snapshot))
    }

    pub async fn get_snapshot(
        &self,
        pool: &Address,
        event_id: EventId,
    ) -> Result<Option<PoolSnapshot>, IndexerError> {
        let row = sqlx::query(
            "SELECT * FROM pool_snapshots WHERE lending_pool = ? AND block_number = ? AND log_index = ?",
        )
        .bind(address_key(pool))
        .bind(db_int(event_id.block_number)?)
        .bind(db_int(event_id.log_index)?)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(decode_snapshot).transpose()
    }

    /// Snapshots of a pool in chain order.
    pub async fn list_snapshots(&self, pool: &Address) -> Result<Vec<PoolSnapshot>, IndexerError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM pool_snapshots
            WHERE lending_pool = ?
            ORDER BY block_number ASC, log_index ASC
            "#,
        )
        .bind(address_key(pool))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_snapshot).collect()
    }

    pub async fn get_protocol_tvl(&self) -> Result<Option<ProtocolTvl>, IndexerError> {
        let mut conn = self.pool.acquire().await?;
        get_tvl_in(&mut conn).await
    }
}

async fn insert_snapshot_in(
    conn: &mut SqliteConnection,
    snapshot: &PoolSnapshot,
) -> Result<(), IndexerError> {
    let key = format!("{}_{}", address_key(&snapshot.pool), snapshot.event_id);
    sqlx::query(
        r#"
        INSERT INTO pool_snapshots (
            lending_pool, block_number, log_index, router, total_supply_assets,
            total_borrow_assets, total_collateral, available_liquidity, utilization,
            borrow_rate, supply_apr, event_type, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(address_key(&snapshot.pool))
    .bind(db_int(snapshot.event_id.block_number)?)
    .bind(db_int(snapshot.event_id.log_index)?)
    .bind(address_key(&snapshot.router))
    .bind(snapshot.total_supply_assets.to_string())
    .bind(snapshot.total_borrow_assets.to_string())
    .bind(snapshot.total_collateral.to_string())
    .bind(snapshot.available_liquidity.to_string())
    .bind(snapshot.utilization.to_string())
    .bind(snapshot.borrow_rate.to_string())
    .bind(snapshot.supply_apr.to_string())
    .bind(snapshot.event_type.as_str())
    .bind(db_int(snapshot.timestamp)?)
    .execute(&mut *conn)
    .await
    .map_err(|e| IndexerError::on_insert(e, "pool_snapshots", key))?;
    Ok(())
}

/// Apply the pool's change since its cached totals to the protocol row.
async fn reconcile_tvl_in(
    conn: &mut SqliteConnection,
    pool: &LendingPool,
    snapshot: &PoolSnapshot,
) -> Result<ProtocolTvl, IndexerError> {
    let delta = TvlDelta::between(&snapshot.totals(), pool.last_snapshot.as_ref())
        .ok_or(IndexerError::Overflow("pool tvl delta"))?;
    let existing = get_tvl_in(conn).await?;
    let tvl = apply_delta(
        existing.as_ref(),
        &delta,
        pool.last_snapshot.is_none(),
        snapshot.timestamp,
    )
    .ok_or(IndexerError::Overflow("protocol tvl"))?;

    sqlx::query(
        r#"
        INSERT INTO protocol_tvl (
            id, total_supply_assets, total_borrow_assets, total_collateral,
            pool_count, last_updated_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            total_supply_assets = excluded.total_supply_assets,
            total_borrow_assets = excluded.total_borrow_assets,
            total_collateral = excluded.total_collateral,
            pool_count = excluded.pool_count,
            last_updated_at = excluded.last_updated_at
        "#,
    )
    .bind(PROTOCOL_TVL_ID)
    .bind(tvl.total_supply_assets.to_string())
    .bind(tvl.total_borrow_assets.to_string())
    .bind(tvl.total_collateral.to_string())
    .bind(db_int(tvl.pool_count)?)
    .bind(db_int(tvl.last_updated_at)?)
    .execute(&mut *conn)
    .await?;

    Ok(tvl)
}

async fn update_cache_in(
    conn: &mut SqliteConnection,
    snapshot: &PoolSnapshot,
) -> Result<(), IndexerError> {
    sqlx::query(
        r#"
        UPDATE lending_pools
        SET last_snapshot_supply = ?, last_snapshot_borrow = ?, last_snapshot_collateral = ?
        WHERE id = ?
        "#,
    )
    .bind(snapshot.total_supply_assets.to_string())
    .bind(snapshot.total_borrow_assets.to_string())
    .bind(snapshot.total_collateral.to_string())
    .bind(address_key(&snapshot.pool))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn get_tvl_in(conn: &mut SqliteConnection) -> Result<Option<ProtocolTvl>, IndexerError> {
    let row = sqlx::query("SELECT * FROM protocol_tvl WHERE id = ?")
        .bind(PROTOCOL_TVL_ID)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|row| {
        Ok(ProtocolTvl {
            total_supply_assets: i256_col(&row, "total_supply_assets")?,
            total_borrow_assets: i256_col(&row, "total_borrow_assets")?,
            total_collateral: i256_col(&row, "total_collateral")?,
            pool_count: u64_col(&row, "pool_count")?,
            last_updated_at: u64_col(&row, "last_updated_at")?,
        })
    })
    .transpose()
}

fn decode_snapshot(row: &SqliteRow) -> Result<PoolSnapshot, IndexerError> {
    let event_type: String = row.try_get("event_type")?;
    let event_type =
        ActivityKind::parse(&event_type).ok_or_else(|| IndexerError::CorruptValue {
            column: "event_type",
            value: event_type.clone(),
        })?;

    Ok(PoolSnapshot {
        pool: address_col(row, "lending_pool")?,
        router: address_col(row, "router")?,
        event_id: EventId::new(u64_col(row, "block_number")?, u64_col(row, "log_index")?),
        event_type,
        timestamp: u64_col(row, "timestamp")?,
        total_supply_assets: u256_col(row, "total_supply_assets")?,
        total_borrow_assets: u256_col(row, "total_borrow_assets")?,
        total_collateral: u256_col(row, "total_collateral")?,
        available_liquidity: u256_col(row, "available_liquidity")?,
        utilization: u256_col(row, "utilization")?,
        borrow_rate: u256_col(row, "borrow_rate")?,
        supply_apr: u256_col(row, "supply_apr")?,
    })
}
