//! Postgres pool bootstrap and schema setup.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::store::postgres::{DEFAULT_OPERATION_TIMEOUT, db_error};
use crate::store::{PostgresCatalogStore, StoreError, StoreResult};

/// Catalog schema (embedded).
const SCHEMA: &str = include_str!("schema.sql");

/// Connection parameters for the catalog database.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub database_url: String,
    pub max_connections: u32,
    /// How long startup waits for a connection (and its ping) before giving up.
    pub connect_timeout: Duration,
    /// Upper bound for each store operation once running.
    pub operation_timeout: Duration,
}

impl PoolSettings {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 25,
            connect_timeout: Duration::from_secs(5),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

/// Open a pool and verify the database answers.
pub async fn connect(settings: &PoolSettings) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.connect_timeout)
        .connect(&settings.database_url)
        .await
        .map_err(db_error("connect"))?;

    match tokio::time::timeout(
        settings.connect_timeout,
        sqlx::query("SELECT 1").execute(&pool),
    )
    .await
    {
        Ok(result) => {
            result.map_err(db_error("ping"))?;
        }
        Err(_) => return Err(StoreError::Timeout { operation: "ping" }),
    }

    info!(max_connections = settings.max_connections, "database connection pool established");
    Ok(pool)
}

/// Apply the embedded schema. Every statement is idempotent.
pub async fn ensure_schema(pool: &PgPool) -> StoreResult<()> {
    for statement in schema_statements(SCHEMA) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(db_error("ensure_schema"))?;
    }
    Ok(())
}

/// Connect, apply the schema and wrap the pool in a store.
pub async fn open_store(settings: &PoolSettings) -> StoreResult<PostgresCatalogStore> {
    let pool = connect(settings).await?;
    ensure_schema(&pool).await?;
    Ok(PostgresCatalogStore::new(pool).with_operation_timeout(settings.operation_timeout))
}

fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_create_statements() {
        let statements = schema_statements(SCHEMA);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS products"));
        assert!(statements[1].contains("ON DELETE CASCADE"));
        assert!(statements[2].starts_with("CREATE INDEX IF NOT EXISTS"));
    }

    #[test]
    fn comment_only_chunks_are_skipped() {
        assert_eq!(schema_statements("-- header\n;\n  ;SELECT 1;"), vec!["SELECT 1"]);
    }

    #[test]
    fn settings_default_to_a_short_connect_timeout() {
        let settings = PoolSettings::new("postgres://localhost/catalog");
        assert_eq!(settings.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.operation_timeout, Duration::from_secs(3));
        assert_eq!(settings.max_connections, 25);
    }
}
