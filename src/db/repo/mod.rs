//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `activity.rs` - Activity event records, positions and shares tokens
//! - `balances.rs` - Per-user running totals
//! - `snapshots.rs` - Pool snapshots and protocol TVL reconciliation
//! - `admin.rs` - Factory, interest-rate-model and emitter configuration

mod activity;
mod admin;
mod balances;
mod snapshots;

pub use snapshots::{SnapshotCommit, SnapshotReading};

use crate::domain::{
    address_key, parse_i256, parse_u256, LendingPool, PoolCreationParams, PoolRateParams,
    PoolTotals, RateCurve, RateParamField,
};
use crate::error::IndexerError;
use alloy_primitives::{Address, I256, U256};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::debug;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Pool operations
    // =========================================================================

    /// Record a newly created pool and merge its creation-time rate curve
    /// into the router's rate parameters, in one transaction.
    ///
    /// # Errors
    /// [`IndexerError::DuplicateKey`] if the pool was already recorded.
    pub async fn create_pool(
        &self,
        pool: &LendingPool,
        default_reserve_factor: U256,
    ) -> Result<(), IndexerError> {
        let key = address_key(&pool.address);
        let params = &pool.params;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO lending_pools (
                id, owner, collateral_token, borrow_token, ltv, supply_liquidity,
                base_rate, rate_at_optimal, optimal_utilization, max_utilization, max_rate,
                liquidation_threshold, liquidation_bonus, router, router_implementation,
                lending_pool_implementation, shares_token, created_at_block,
                created_at_timestamp, total_collateral
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key)
        .bind(pool.owner.as_ref().map(address_key))
        .bind(address_key(&params.collateral_token))
        .bind(address_key(&params.borrow_token))
        .bind(params.ltv.to_string())
        .bind(params.supply_liquidity.to_string())
        .bind(params.base_rate.to_string())
        .bind(params.rate_at_optimal.to_string())
        .bind(params.optimal_utilization.to_string())
        .bind(params.max_utilization.to_string())
        .bind(params.max_rate.to_string())
        .bind(params.liquidation_threshold.to_string())
        .bind(params.liquidation_bonus.to_string())
        .bind(address_key(&pool.router))
        .bind(address_key(&pool.router_implementation))
        .bind(address_key(&pool.lending_pool_implementation))
        .bind(address_key(&pool.shares_token))
        .bind(db_int(pool.created_at_block)?)
        .bind(db_int(pool.created_at_timestamp)?)
        .bind(pool.total_collateral.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| IndexerError::on_insert(e, "lending_pools", key.clone()))?;

        merge_curve(&mut *tx, &pool.router, &params.curve(), default_reserve_factor).await?;

        tx.commit().await?;
        debug!(pool = %key, router = %pool.router, "pool created");
        Ok(())
    }

    /// Point lookup of a pool by address.
    pub async fn get_pool(&self, address: &Address) -> Result<Option<LendingPool>, IndexerError> {
        let mut conn = self.pool.acquire().await?;
        get_pool_in(&mut conn, address).await
    }

    /// Set a pool's owner. Returns `false` if the pool is unknown.
    pub async fn update_pool_owner(
        &self,
        address: &Address,
        owner: &Address,
    ) -> Result<bool, IndexerError> {
        let result = sqlx::query("UPDATE lending_pools SET owner = ? WHERE id = ?")
            .bind(address_key(owner))
            .bind(address_key(address))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_pools(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) AS pool_count FROM lending_pools")
            .fetch_one(&self.pool)
            .await?;
        u64_col(&row, "pool_count")
    }

    // =========================================================================
    // Rate parameter operations
    // =========================================================================

    /// Merge a single rate-model field into the router's parameters.
    ///
    /// Sibling fields are never touched. A router seen for the first time is
    /// seeded with zeros and `default_reserve_factor` before the field is set.
    pub async fn set_rate_param(
        &self,
        router: &Address,
        field: RateParamField,
        value: U256,
        default_reserve_factor: U256,
    ) -> Result<(), IndexerError> {
        let column = field.column();
        let seed = |f: RateParamField| {
            if f == field {
                value
            } else if f == RateParamField::ReserveFactor {
                default_reserve_factor
            } else {
                U256::ZERO
            }
        };

        let sql = format!(
            r#"
            INSERT INTO pool_rate_params (
                router, base_rate, rate_at_optimal, optimal_utilization,
                max_utilization, max_rate, reserve_factor
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(router) DO UPDATE SET {column} = excluded.{column}
            "#
        );
        let mut query = sqlx::query(&sql).bind(address_key(router));
        for f in RateParamField::ALL {
            query = query.bind(seed(f).to_string());
        }
        query.execute(&self.pool).await?;

        debug!(router = %router, field = column, value = %value, "rate parameter merged");
        Ok(())
    }

    pub async fn get_rate_params(
        &self,
        router: &Address,
    ) -> Result<Option<PoolRateParams>, IndexerError> {
        let row = sqlx::query(
            r#"
            SELECT router, base_rate, rate_at_optimal, optimal_utilization,
                   max_utilization, max_rate, reserve_factor
            FROM pool_rate_params
            WHERE router = ?
            "#,
        )
        .bind(address_key(router))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(PoolRateParams {
                router: address_col(&row, "router")?,
                curve: RateCurve {
                    base_rate: u256_col(&row, "base_rate")?,
                    rate_at_optimal: u256_col(&row, "rate_at_optimal")?,
                    optimal_utilization: u256_col(&row, "optimal_utilization")?,
                    max_utilization: u256_col(&row, "max_utilization")?,
                    max_rate: u256_col(&row, "max_rate")?,
                },
                reserve_factor: u256_col(&row, "reserve_factor")?,
            })
        })
        .transpose()
    }
}

/// Merge the five curve columns; the reserve factor only applies to a new row.
async fn merge_curve(
    conn: &mut SqliteConnection,
    router: &Address,
    curve: &RateCurve,
    default_reserve_factor: U256,
) -> Result<(), IndexerError> {
    sqlx::query(
        r#"
        INSERT INTO pool_rate_params (
            router, base_rate, rate_at_optimal, optimal_utilization,
            max_utilization, max_rate, reserve_factor
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(router) DO UPDATE SET
            base_rate = excluded.base_rate,
            rate_at_optimal = excluded.rate_at_optimal,
            optimal_utilization = excluded.optimal_utilization,
            max_utilization = excluded.max_utilization,
            max_rate = excluded.max_rate
        "#,
    )
    .bind(address_key(router))
    .bind(curve.base_rate.to_string())
    .bind(curve.rate_at_optimal.to_string())
    .bind(curve.optimal_utilization.to_string())
    .bind(curve.max_utilization.to_string())
    .bind(curve.max_rate.to_string())
    .bind(default_reserve_factor.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(super) async fn get_pool_in(
    conn: &mut SqliteConnection,
    address: &Address,
) -> Result<Option<LendingPool>, IndexerError> {
    let row = sqlx::query("SELECT * FROM lending_pools WHERE id = ?")
        .bind(address_key(address))
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(decode_pool).transpose()
}

fn decode_pool(row: &SqliteRow) -> Result<LendingPool, IndexerError> {
    let last_snapshot = match (
        opt_u256_col(row, "last_snapshot_supply")?,
        opt_u256_col(row, "last_snapshot_borrow")?,
        opt_u256_col(row, "last_snapshot_collateral")?,
    ) {
        (Some(supply), Some(borrow), Some(collateral)) => Some(PoolTotals {
            supply,
            borrow,
            collateral,
        }),
        _ => None,
    };

    Ok(LendingPool {
        address: address_col(row, "id")?,
        owner: opt_address_col(row, "owner")?,
        params: PoolCreationParams {
            collateral_token: address_col(row, "collateral_token")?,
            borrow_token: address_col(row, "borrow_token")?,
            ltv: u256_col(row, "ltv")?,
            supply_liquidity: u256_col(row, "supply_liquidity")?,
            base_rate: u256_col(row, "base_rate")?,
            rate_at_optimal: u256_col(row, "rate_at_optimal")?,
            optimal_utilization: u256_col(row, "optimal_utilization")?,
            max_utilization: u256_col(row, "max_utilization")?,
            max_rate: u256_col(row, "max_rate")?,
            liquidation_threshold: u256_col(row, "liquidation_threshold")?,
            liquidation_bonus: u256_col(row, "liquidation_bonus")?,
        },
        router: address_col(row, "router")?,
        router_implementation: address_col(row, "router_implementation")?,
        lending_pool_implementation: address_col(row, "lending_pool_implementation")?,
        shares_token: address_col(row, "shares_token")?,
        created_at_block: u64_col(row, "created_at_block")?,
        created_at_timestamp: u64_col(row, "created_at_timestamp")?,
        total_collateral: u256_col(row, "total_collateral")?,
        last_snapshot,
        snapshot_version: u64_col(row, "snapshot_version")?,
    })
}

// =============================================================================
// Column codecs
// =============================================================================

/// SQLite integers are signed 64-bit.
pub(super) fn db_int(value: u64) -> Result<i64, IndexerError> {
    i64::try_from(value).map_err(|_| IndexerError::Overflow("integer column"))
}

pub(super) fn u64_col(row: &SqliteRow, column: &'static str) -> Result<u64, IndexerError> {
    let value: i64 = row.try_get(column)?;
    u64::try_from(value).map_err(|_| IndexerError::CorruptValue {
        column,
        value: value.to_string(),
    })
}

pub(super) fn u256_col(row: &SqliteRow, column: &'static str) -> Result<U256, IndexerError> {
    let raw: String = row.try_get(column)?;
    parse_u256(&raw).map_err(|source| IndexerError::Corrupt { column, source })
}

pub(super) fn opt_u256_col(
    row: &SqliteRow,
    column: &'static str,
) -> Result<Option<U256>, IndexerError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| parse_u256(&raw).map_err(|source| IndexerError::Corrupt { column, source }))
        .transpose()
}

pub(super) fn i256_col(row: &SqliteRow, column: &'static str) -> Result<I256, IndexerError> {
    let raw: String = row.try_get(column)?;
    parse_i256(&raw).map_err(|source| IndexerError::Corrupt { column, source })
}

pub(super) fn address_col(row: &SqliteRow, column: &'static str) -> Result<Address, IndexerError> {
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|_| IndexerError::CorruptValue { column, value: raw })
}

pub(super) fn opt_address_col(
    row: &SqliteRow,
    column: &'static str,
) -> Result<Option<Address>, IndexerError> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| IndexerError::CorruptValue { column, value: raw }),
        None => Ok(None),
    }
}
