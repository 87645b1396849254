//! Per-user running totals.

use crate::domain::{address_key, user_pool_key, BalanceKind, UserPoolBalance};
use crate::error::IndexerError;
use alloy_primitives::{Address, U256};
use sqlx::sqlite::{SqliteConnection, SqliteRow};

use super::{address_col, u256_col, Repository};

impl Repository {
    /// Add `amount` to one counter of the `(user, pool)` balance, creating
    /// the row with all counters at zero if it does not exist yet.
    ///
    /// Sibling counters are never touched. Returns the updated balance.
    ///
    /// # Errors
    /// [`IndexerError::Overflow`] if the counter would exceed `U256::MAX`.
    pub async fn accumulate_balance(
        &self,
        user: &Address,
        pool: &Address,
        kind: BalanceKind,
        amount: U256,
    ) -> Result<UserPoolBalance, IndexerError> {
        let mut tx = self.pool.begin().await?;
        let balance = accumulate_in(&mut *tx, user, pool, kind, amount).await?;
        tx.commit().await?;
        Ok(balance)
    }

    pub async fn get_user_pool_balance(
        &self,
        user: &Address,
        pool: &Address,
    ) -> Result<Option<UserPoolBalance>, IndexerError> {
        let row = sqlx::query("SELECT * FROM user_pool_balances WHERE id = ?")
            .bind(user_pool_key(user, pool))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_balance).transpose()
    }

    /// All balances of a user across pools.
    pub async fn list_user_balances(
        &self,
        user: &Address,
    ) -> Result<Vec<UserPoolBalance>, IndexerError> {
        let rows = sqlx::query(
            "SELECT * FROM user_pool_balances WHERE user = ? ORDER BY lending_pool ASC",
        )
        .bind(address_key(user))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_balance).collect()
    }
}

/// Read-modify-write of one counter inside the caller's transaction.
///
/// The insert-if-absent runs first so the transaction holds the write lock
/// before the row is read.
pub(super) async fn accumulate_in(
    conn: &mut SqliteConnection,
    user: &Address,
    pool: &Address,
    kind: BalanceKind,
    amount: U256,
) -> Result<UserPoolBalance, IndexerError> {
    let key = user_pool_key(user, pool);

    sqlx::query(
        r#"
        INSERT INTO user_pool_balances (
            id, user, lending_pool, total_supplied, total_withdrawn, total_borrowed,
            total_repaid, total_collateral_supplied, total_collateral_withdrawn
        ) VALUES (?, ?, ?, '0', '0', '0', '0', '0', '0')
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&key)
    .bind(address_key(user))
    .bind(address_key(pool))
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query("SELECT * FROM user_pool_balances WHERE id = ?")
        .bind(&key)
        .fetch_one(&mut *conn)
        .await?;
    let mut balance = decode_balance(&row)?;

    let total = balance
        .accumulate(kind, amount)
        .ok_or(IndexerError::Overflow(kind.column()))?;

    let column = kind.column();
    sqlx::query(&format!("UPDATE user_pool_balances SET {column} = ? WHERE id = ?"))
        .bind(total.to_string())
        .bind(&key)
        .execute(&mut *conn)
        .await?;

    Ok(balance)
}

fn decode_balance(row: &SqliteRow) -> Result<UserPoolBalance, IndexerError> {
    let mut balance =
        UserPoolBalance::empty(address_col(row, "user")?, address_col(row, "lending_pool")?);
    for kind in BalanceKind::ALL {
        let value = u256_col(row, kind.column())?;
        if !value.is_zero() {
            balance.accumulate(kind, value);
        }
    }
    Ok(balance)
}
