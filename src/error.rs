use crate::domain::AmountParseError;
use crate::engine::RateError;
use thiserror::Error;

/// Errors that abort the processing of an event.
///
/// Recoverable conditions (unknown pool, failed live read) never surface
/// here; they are reported as skip outcomes by the snapshot builder.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    /// An append-only record was written twice: the feed replayed an event.
    #[error("duplicate key {key} in {table}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("rate computation failed: {0}")]
    Rate(#[from] RateError),
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
    #[error("corrupt amount in column {column}: {source}")]
    Corrupt {
        column: &'static str,
        source: AmountParseError,
    },
    #[error("corrupt value in column {column}: {value:?}")]
    CorruptValue { column: &'static str, value: String },
    #[error("event feed read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("event task failed: {0}")]
    Task(String),
}

impl IndexerError {
    /// Map a unique-constraint violation on an insert to [`IndexerError::DuplicateKey`].
    pub fn on_insert(err: sqlx::Error, table: &'static str, key: impl Into<String>) -> Self {
        let duplicate = err
            .as_database_error()
            .is_some_and(|db| db.kind() == sqlx::error::ErrorKind::UniqueViolation);
        if duplicate {
            IndexerError::DuplicateKey {
                table,
                key: key.into(),
            }
        } else {
            IndexerError::Db(err)
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IndexerError::DuplicateKey { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_constraint_error_stays_db() {
        let err = IndexerError::on_insert(sqlx::Error::RowNotFound, "pool_snapshots", "k");
        assert!(matches!(err, IndexerError::Db(_)));
        assert!(!err.is_duplicate());
    }

    #[test]
    fn test_duplicate_display() {
        let err = IndexerError::DuplicateKey {
            table: "supply_liquidity_events",
            key: "100-3".to_string(),
        };
        assert!(err.is_duplicate());
        assert_eq!(
            err.to_string(),
            "duplicate key 100-3 in supply_liquidity_events"
        );
    }
}
