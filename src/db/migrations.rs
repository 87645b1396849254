//! Database bootstrap: connection pool, pragmas and the embedded schema.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, warn};

/// Stamped into `PRAGMA user_version` once `schema.sql` has been applied.
pub const SCHEMA_VERSION: i64 = 1;

/// Per-connection settings. `busy_timeout` lets concurrent snapshot
/// transactions queue on the write lock instead of failing with SQLITE_BUSY.
const CONNECTION_PRAGMAS: [&str; 3] = [
    "PRAGMA foreign_keys = ON",
    "PRAGMA busy_timeout = 5000",
    "PRAGMA synchronous = NORMAL",
];

/// Open (creating if needed) the indexer database, configure every pooled
/// connection and apply the embedded schema.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_connection(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    apply_schema(&pool).await?;

    info!("Database ready at {} (schema v{})", db_path, SCHEMA_VERSION);
    Ok(pool)
}

/// Run `schema.sql` and stamp the schema version.
///
/// Every statement is `IF NOT EXISTS`, so rerunning against an existing
/// database is a no-op. A database stamped by a newer build is left alone
/// apart from a warning.
async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let current = schema_version(pool).await?;
    if current > SCHEMA_VERSION {
        warn!(
            found = current,
            expected = SCHEMA_VERSION,
            "database schema is newer than this build"
        );
    }

    let mut applied = 0usize;
    for statement in include_str!("schema.sql").split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
        applied += 1;
    }

    if current < SCHEMA_VERSION {
        // PRAGMA arguments cannot be bound
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .execute(pool)
            .await?;
    }
    debug!(statements = applied, from = current, "schema applied");
    Ok(())
}

pub async fn schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(pool).await?;
    Ok(row.get(0))
}

async fn configure_connection(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for pragma in CONNECTION_PRAGMAS {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }

    // journal_mode reports the mode actually in effect
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    debug!(journal_mode = %journal_mode, "connection configured");
    Ok(())
}
