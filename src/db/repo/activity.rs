//! Activity event records, positions and shares-token deployments.

use crate::domain::{
    address_key, hash_key, ActivityKind, ActivityRecord, CollateralEffect, EventId, Position,
    UserPoolBalance,
};
use crate::error::IndexerError;
use alloy_primitives::{Address, B256, U256};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::{debug, warn};

use super::balances::accumulate_in;
use super::{address_col, db_int, opt_u256_col, u256_col, u64_col, Repository};

impl Repository {
    /// Persist an activity event and fold its amount into the user's balance.
    ///
    /// Both writes, plus the pool collateral adjustment of collateral events,
    /// commit together: a replayed event fails on the record insert with
    /// [`IndexerError::DuplicateKey`] and leaves the balance untouched.
    pub async fn record_activity(
        &self,
        record: &ActivityRecord,
    ) -> Result<UserPoolBalance, IndexerError> {
        let mut tx = self.pool.begin().await?;

        insert_activity_in(&mut *tx, record).await?;
        let balance = accumulate_in(
            &mut *tx,
            &record.user,
            &record.pool,
            record.kind.balance_kind(),
            record.amount,
        )
        .await?;
        if let Some(effect) = record.kind.collateral_effect() {
            adjust_collateral_in(&mut *tx, &record.pool, effect, record.amount).await?;
        }

        tx.commit().await?;
        debug!(
            kind = %record.kind,
            id = %record.id,
            pool = %record.pool,
            user = %record.user,
            "activity recorded"
        );
        Ok(balance)
    }

    /// Point lookup of an activity record by kind and event id.
    pub async fn get_activity(
        &self,
        kind: ActivityKind,
        id: EventId,
    ) -> Result<Option<ActivityRecord>, IndexerError> {
        let row = sqlx::query(&format!("SELECT * FROM {} WHERE id = ?", kind.table()))
            .bind(id.key())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_activity(kind, &row)).transpose()
    }

    pub async fn count_activity(&self, kind: ActivityKind) -> Result<u64, IndexerError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS event_count FROM {}", kind.table()))
            .fetch_one(&self.pool)
            .await?;
        u64_col(&row, "event_count")
    }

    // =========================================================================
    // Positions and shares tokens
    // =========================================================================

    pub async fn insert_position(&self, position: &Position) -> Result<(), IndexerError> {
        let key = address_key(&position.address);
        sqlx::query(
            r#"
            INSERT INTO positions (
                position, lending_pool, lending_pool_router, user,
                created_at_block, created_at_timestamp
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key)
        .bind(address_key(&position.pool))
        .bind(address_key(&position.router))
        .bind(address_key(&position.user))
        .bind(db_int(position.created_at_block)?)
        .bind(db_int(position.created_at_timestamp)?)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::on_insert(e, "positions", key))?;
        Ok(())
    }

    pub async fn get_position(&self, address: &Address) -> Result<Option<Position>, IndexerError> {
        let row = sqlx::query("SELECT * FROM positions WHERE position = ?")
            .bind(address_key(address))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Position {
                address: address_col(&row, "position")?,
                pool: address_col(&row, "lending_pool")?,
                router: address_col(&row, "lending_pool_router")?,
                user: address_col(&row, "user")?,
                created_at_block: u64_col(&row, "created_at_block")?,
                created_at_timestamp: u64_col(&row, "created_at_timestamp")?,
            })
        })
        .transpose()
    }

    pub async fn list_user_positions(&self, user: &Address) -> Result<Vec<Address>, IndexerError> {
        let rows = sqlx::query(
            "SELECT position FROM positions WHERE user = ? ORDER BY created_at_block, position",
        )
        .bind(address_key(user))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| address_col(row, "position")).collect()
    }

    pub async fn insert_shares_token(
        &self,
        shares_token: &Address,
        router: &Address,
    ) -> Result<(), IndexerError> {
        let key = address_key(shares_token);
        sqlx::query(
            "INSERT INTO shares_token_deployments (shares_token, lending_pool_router) VALUES (?, ?)",
        )
        .bind(&key)
        .bind(address_key(router))
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::on_insert(e, "shares_token_deployments", key))?;
        Ok(())
    }

    /// Router a shares token was deployed for.
    pub async fn get_shares_token_router(
        &self,
        shares_token: &Address,
    ) -> Result<Option<Address>, IndexerError> {
        let row = sqlx::query(
            "SELECT lending_pool_router FROM shares_token_deployments WHERE shares_token = ?",
        )
        .bind(address_key(shares_token))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| address_col(&row, "lending_pool_router")).transpose()
    }
}

async fn insert_activity_in(
    conn: &mut SqliteConnection,
    record: &ActivityRecord,
) -> Result<(), IndexerError> {
    let table = record.kind.table();
    let key = record.id.key();

    let mut extra: Vec<(&'static str, String)> = Vec::new();
    if let Some(position) = &record.position {
        extra.push(("position_address", address_key(position)));
    }
    if let Some(fee) = record.protocol_fee {
        extra.push(("protocol_fee", fee.to_string()));
    }
    if let Some(user_amount) = record.user_amount {
        extra.push(("user_amount", user_amount.to_string()));
    }
    if let Some(shares) = record.shares {
        extra.push(("shares", shares.to_string()));
    }

    let extra_columns: String = extra.iter().map(|(c, _)| format!(", {c}")).collect();
    let extra_params = ", ?".repeat(extra.len());
    let sql = format!(
        "INSERT INTO {table} (id, lending_pool, user, amount, block_number, log_index, \
         timestamp, tx_hash, indexed_at{extra_columns}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?{extra_params})"
    );

    let mut query = sqlx::query(&sql)
        .bind(key.clone())
        .bind(address_key(&record.pool))
        .bind(address_key(&record.user))
        .bind(record.amount.to_string())
        .bind(db_int(record.id.block_number)?)
        .bind(db_int(record.id.log_index)?)
        .bind(db_int(record.timestamp)?)
        .bind(hash_key(&record.tx_hash))
        .bind(chrono::Utc::now().timestamp_millis());
    for (_, value) in extra {
        query = query.bind(value);
    }

    query
        .execute(&mut *conn)
        .await
        .map_err(|e| IndexerError::on_insert(e, table, key))?;
    Ok(())
}

/// Move the pool's collateral total. Releases saturate at zero; an unknown
/// pool is left alone.
async fn adjust_collateral_in(
    conn: &mut SqliteConnection,
    pool: &Address,
    effect: CollateralEffect,
    amount: U256,
) -> Result<(), IndexerError> {
    let row = sqlx::query("SELECT total_collateral FROM lending_pools WHERE id = ?")
        .bind(address_key(pool))
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        warn!(pool = %pool, "collateral event for unknown pool, collateral not tracked");
        return Ok(());
    };

    let current = u256_col(&row, "total_collateral")?;
    let updated = match effect {
        CollateralEffect::Deposit => current
            .checked_add(amount)
            .ok_or(IndexerError::Overflow("total_collateral"))?,
        CollateralEffect::Release => current.saturating_sub(amount),
    };

    sqlx::query("UPDATE lending_pools SET total_collateral = ? WHERE id = ?")
        .bind(updated.to_string())
        .bind(address_key(pool))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn decode_activity(kind: ActivityKind, row: &SqliteRow) -> Result<ActivityRecord, IndexerError> {
    let has_shares = matches!(
        kind,
        ActivityKind::SupplyLiquidity
            | ActivityKind::WithdrawLiquidity
            | ActivityKind::BorrowDebt
            | ActivityKind::RepayByPosition
    );
    let is_borrow = kind == ActivityKind::BorrowDebt;

    let tx_hash: String = row.try_get("tx_hash")?;
    let tx_hash: B256 = tx_hash.parse().map_err(|_| IndexerError::CorruptValue {
        column: "tx_hash",
        value: tx_hash.clone(),
    })?;

    Ok(ActivityRecord {
        kind,
        id: EventId::new(u64_col(row, "block_number")?, u64_col(row, "log_index")?),
        pool: address_col(row, "lending_pool")?,
        user: address_col(row, "user")?,
        amount: u256_col(row, "amount")?,
        shares: if has_shares {
            opt_u256_col(row, "shares")?
        } else {
            None
        },
        position: if kind == ActivityKind::SupplyCollateral {
            Some(address_col(row, "position_address")?)
        } else {
            None
        },
        protocol_fee: if is_borrow {
            opt_u256_col(row, "protocol_fee")?
        } else {
            None
        },
        user_amount: if is_borrow {
            opt_u256_col(row, "user_amount")?
        } else {
            None
        },
        timestamp: u64_col(row, "timestamp")?,
        tx_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn record(kind: ActivityKind, block: u64, pool: Address, amount: U256) -> ActivityRecord {
        ActivityRecord {
            kind,
            id: EventId::new(block, 0),
            pool,
            user: Address::repeat_byte(0x11),
            amount,
            shares: matches!(
                kind,
                ActivityKind::SupplyLiquidity
                    | ActivityKind::WithdrawLiquidity
                    | ActivityKind::BorrowDebt
                    | ActivityKind::RepayByPosition
            )
            .then_some(amount),
            position: (kind == ActivityKind::SupplyCollateral)
                .then_some(Address::repeat_byte(0x55)),
            protocol_fee: (kind == ActivityKind::BorrowDebt).then_some(U256::from(7u64)),
            user_amount: (kind == ActivityKind::BorrowDebt).then_some(amount),
            timestamp: 1_700_000_100,
            tx_hash: B256::repeat_byte(0xab),
        }
    }

    #[tokio::test]
    async fn test_record_activity_roundtrip_for_every_kind() {
        let (repo, _temp) = setup_repo().await;
        let pool = Address::repeat_byte(0x22);
        let kinds = [
            ActivityKind::SupplyLiquidity,
            ActivityKind::WithdrawLiquidity,
            ActivityKind::SupplyCollateral,
            ActivityKind::BorrowDebt,
            ActivityKind::RepayByPosition,
            ActivityKind::WithdrawCollateral,
        ];

        for (block, kind) in kinds.into_iter().enumerate() {
            let rec = record(kind, block as u64 + 1, pool, wad(5));
            repo.record_activity(&rec).await.unwrap();
            let loaded = repo.get_activity(kind, rec.id).await.unwrap().unwrap();
            assert_eq!(loaded, rec);
            assert_eq!(repo.count_activity(kind).await.unwrap(), 1);
        }

        let balance = repo
            .get_user_pool_balance(&Address::repeat_byte(0x11), &pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.total_supplied, wad(5));
        assert_eq!(balance.total_collateral_withdrawn, wad(5));
    }

    #[tokio::test]
    async fn test_replayed_activity_is_duplicate_and_not_accumulated() {
        let (repo, _temp) = setup_repo().await;
        let pool = Address::repeat_byte(0x22);
        let rec = record(ActivityKind::SupplyLiquidity, 9, pool, wad(10));

        repo.record_activity(&rec).await.unwrap();
        let err = repo.record_activity(&rec).await.unwrap_err();
        assert!(err.is_duplicate());

        let balance = repo
            .get_user_pool_balance(&rec.user, &pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.total_supplied, wad(10));
    }

    #[tokio::test]
    async fn test_collateral_events_move_pool_collateral() {
        let (repo, _temp) = setup_repo().await;
        let pool = sample_pool(Address::repeat_byte(0x22), Address::repeat_byte(0x23));
        repo.create_pool(&pool, RESERVE_FACTOR).await.unwrap();

        let supply = record(ActivityKind::SupplyCollateral, 1, pool.address, wad(50));
        let withdraw = record(ActivityKind::WithdrawCollateral, 2, pool.address, wad(20));
        repo.record_activity(&supply).await.unwrap();
        repo.record_activity(&withdraw).await.unwrap();

        let loaded = repo.get_pool(&pool.address).await.unwrap().unwrap();
        assert_eq!(loaded.total_collateral, wad(30));

        let over = record(ActivityKind::WithdrawCollateral, 3, pool.address, wad(100));
        repo.record_activity(&over).await.unwrap();
        let loaded = repo.get_pool(&pool.address).await.unwrap().unwrap();
        assert_eq!(loaded.total_collateral, U256::ZERO);
        assert!(loaded.last_snapshot.is_none());
    }

    #[tokio::test]
    async fn test_positions_and_shares_tokens() {
        let (repo, _temp) = setup_repo().await;
        let position = Position {
            address: Address::repeat_byte(0x55),
            pool: Address::repeat_byte(0x22),
            router: Address::repeat_byte(0x23),
            user: Address::repeat_byte(0x11),
            created_at_block: 5,
            created_at_timestamp: 1_700_000_000,
        };
        repo.insert_position(&position).await.unwrap();
        assert_eq!(
            repo.get_position(&position.address).await.unwrap(),
            Some(position.clone())
        );
        assert_eq!(
            repo.list_user_positions(&position.user).await.unwrap(),
            vec![position.address]
        );
        assert!(repo.insert_position(&position).await.unwrap_err().is_duplicate());

        let token = Address::repeat_byte(0x66);
        repo.insert_shares_token(&token, &position.router).await.unwrap();
        assert_eq!(
            repo.get_shares_token_router(&token).await.unwrap(),
            Some(position.router)
        );
    }
}
