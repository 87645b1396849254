//! Factory, interest-rate-model and emitter configuration.
//!
//! Singleton rows (`factory`, `irm`) are upserted by every setter, so a
//! setter that arrives before the setup event still lands.

use crate::domain::{address_key, FactoryAddressField, FactoryConfig, IrmConfig, FACTORY_ID, IRM_ID};
use crate::error::IndexerError;
use alloy_primitives::{Address, U256};
use sqlx::Row;

use super::{address_col, opt_address_col, opt_u256_col, u256_col, Repository};

impl Repository {
    // =========================================================================
    // Factory
    // =========================================================================

    /// Create the factory row if absent.
    pub async fn ensure_factory(&self) -> Result<(), IndexerError> {
        sqlx::query("INSERT INTO factory_config (id) VALUES (?) ON CONFLICT(id) DO NOTHING")
            .bind(FACTORY_ID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_factory_owner(&self, owner: &Address) -> Result<(), IndexerError> {
        self.upsert_singleton_text("factory_config", FACTORY_ID, "owner", address_key(owner))
            .await
    }

    pub async fn set_factory_address(
        &self,
        field: FactoryAddressField,
        value: &Address,
    ) -> Result<(), IndexerError> {
        let value = address_key(value);
        self.upsert_singleton_text("factory_config", FACTORY_ID, field.column(), value)
            .await
    }

    pub async fn set_factory_paused(&self, paused: bool) -> Result<(), IndexerError> {
        sqlx::query(
            r#"
            INSERT INTO factory_config (id, paused) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET paused = excluded.paused
            "#,
        )
        .bind(FACTORY_ID)
        .bind(paused)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_factory_config(&self) -> Result<Option<FactoryConfig>, IndexerError> {
        let row = sqlx::query("SELECT * FROM factory_config WHERE id = ?")
            .bind(FACTORY_ID)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut addresses = Vec::new();
        for field in FactoryAddressField::ALL {
            if let Some(address) = opt_address_col(&row, field.column())? {
                addresses.push((field, address));
            }
        }
        Ok(Some(FactoryConfig {
            owner: opt_address_col(&row, "owner")?,
            paused: row.try_get("paused")?,
            addresses,
        }))
    }

    pub async fn set_operator(&self, operator: &Address, status: bool) -> Result<(), IndexerError> {
        sqlx::query(
            r#"
            INSERT INTO factory_operators (operator, status) VALUES (?, ?)
            ON CONFLICT(operator) DO UPDATE SET status = excluded.status
            "#,
        )
        .bind(address_key(operator))
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_operator_status(
        &self,
        operator: &Address,
    ) -> Result<Option<bool>, IndexerError> {
        let row = sqlx::query("SELECT status FROM factory_operators WHERE operator = ?")
            .bind(address_key(operator))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row.try_get("status"))
            .transpose()
            .map_err(IndexerError::from)
    }

    pub async fn set_oft_address(
        &self,
        token: &Address,
        oft_address: &Address,
    ) -> Result<(), IndexerError> {
        sqlx::query(
            r#"
            INSERT INTO factory_oft_addresses (token, oft_address) VALUES (?, ?)
            ON CONFLICT(token) DO UPDATE SET oft_address = excluded.oft_address
            "#,
        )
        .bind(address_key(token))
        .bind(address_key(oft_address))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_oft_address(&self, token: &Address) -> Result<Option<Address>, IndexerError> {
        let row = sqlx::query("SELECT oft_address FROM factory_oft_addresses WHERE token = ?")
            .bind(address_key(token))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| address_col(&row, "oft_address")).transpose()
    }

    pub async fn set_min_supply(&self, token: &Address, amount: U256) -> Result<(), IndexerError> {
        sqlx::query(
            r#"
            INSERT INTO factory_min_supply (token, min_amount) VALUES (?, ?)
            ON CONFLICT(token) DO UPDATE SET min_amount = excluded.min_amount
            "#,
        )
        .bind(address_key(token))
        .bind(amount.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_min_supply(&self, token: &Address) -> Result<Option<U256>, IndexerError> {
        let row = sqlx::query("SELECT min_amount FROM factory_min_supply WHERE token = ?")
            .bind(address_key(token))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| u256_col(&row, "min_amount")).transpose()
    }

    pub async fn set_chain_eid(&self, chain_id: U256, eid: u32) -> Result<(), IndexerError> {
        sqlx::query(
            r#"
            INSERT INTO factory_chain_eids (chain_id, eid) VALUES (?, ?)
            ON CONFLICT(chain_id) DO UPDATE SET eid = excluded.eid
            "#,
        )
        .bind(chain_id.to_string())
        .bind(i64::from(eid))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_chain_eid(&self, chain_id: U256) -> Result<Option<u32>, IndexerError> {
        let row = sqlx::query("SELECT eid FROM factory_chain_eids WHERE chain_id = ?")
            .bind(chain_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let eid: i64 = row.try_get("eid")?;
        u32::try_from(eid)
            .map(Some)
            .map_err(|_| IndexerError::CorruptValue {
                column: "eid",
                value: eid.to_string(),
            })
    }

    pub async fn set_creator_fee(&self, router: &Address, fee: U256) -> Result<(), IndexerError> {
        sqlx::query(
            r#"
            INSERT INTO factory_creator_fees (router, fee) VALUES (?, ?)
            ON CONFLICT(router) DO UPDATE SET fee = excluded.fee
            "#,
        )
        .bind(address_key(router))
        .bind(fee.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_creator_fee(&self, router: &Address) -> Result<Option<U256>, IndexerError> {
        let row = sqlx::query("SELECT fee FROM factory_creator_fees WHERE router = ?")
            .bind(address_key(router))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| u256_col(&row, "fee")).transpose()
    }

    // =========================================================================
    // Interest rate model
    // =========================================================================

    pub async fn ensure_irm(&self) -> Result<(), IndexerError> {
        sqlx::query("INSERT INTO irm_config (id) VALUES (?) ON CONFLICT(id) DO NOTHING")
            .bind(IRM_ID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_irm_owner(&self, owner: &Address) -> Result<(), IndexerError> {
        self.upsert_singleton_text("irm_config", IRM_ID, "owner", address_key(owner))
            .await
    }

    pub async fn set_scaled_percentage(&self, percentage: U256) -> Result<(), IndexerError> {
        let value = percentage.to_string();
        self.upsert_singleton_text("irm_config", IRM_ID, "scaled_percentage", value)
            .await
    }

    pub async fn get_irm_config(&self) -> Result<Option<IrmConfig>, IndexerError> {
        let row = sqlx::query("SELECT owner, scaled_percentage FROM irm_config WHERE id = ?")
            .bind(IRM_ID)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(IrmConfig {
                owner: opt_address_col(&row, "owner")?,
                scaled_percentage: opt_u256_col(&row, "scaled_percentage")?,
            })
        })
        .transpose()
    }

    // =========================================================================
    // Emitter
    // =========================================================================

    pub async fn set_emitter_admin(
        &self,
        account: &Address,
        is_admin: bool,
    ) -> Result<(), IndexerError> {
        sqlx::query(
            r#"
            INSERT INTO emitter_admins (account, is_admin) VALUES (?, ?)
            ON CONFLICT(account) DO UPDATE SET is_admin = excluded.is_admin
            "#,
        )
        .bind(address_key(account))
        .bind(is_admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_emitter_admin(&self, account: &Address) -> Result<Option<bool>, IndexerError> {
        let row = sqlx::query("SELECT is_admin FROM emitter_admins WHERE account = ?")
            .bind(address_key(account))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row.try_get("is_admin"))
            .transpose()
            .map_err(IndexerError::from)
    }

    /// Set one TEXT column of a singleton row, creating the row if needed.
    ///
    /// `table` and `column` come from fixed identifiers, never from event data.
    async fn upsert_singleton_text(
        &self,
        table: &'static str,
        id: &'static str,
        column: &'static str,
        value: String,
    ) -> Result<(), IndexerError> {
        let sql = format!(
            "INSERT INTO {table} (id, {column}) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET {column} = excluded.{column}"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
