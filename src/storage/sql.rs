// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL backend store.
//!
//! A single unique-key table holds every accepted item:
//!
//! ```sql
//! CREATE TABLE dedup_items (
//!   item VARCHAR(255) PRIMARY KEY
//! )
//! ```
//!
//! The primary key carries the whole contract: inserts use the dialect's
//! insert-if-absent form, so a second `store` of the same item is a no-op
//! and `SELECT COUNT(*)` stays exact. Contents survive process restarts.
//!
//! ## sqlx Any driver
//!
//! One store covers SQLite, MySQL and Postgres through sqlx's `Any` driver.
//! The Any driver passes query strings through verbatim, so the
//! insert-if-absent statement (and the bind placeholder, for Postgres) is
//! selected per dialect at connection time.

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};

use super::traits::{BackendStore, StorageError};
use crate::resilience::retry::{retry, RetryConfig};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SqlDialect {
    Sqlite,
    Mysql,
    Postgres,
}

impl SqlDialect {
    fn from_url(url: &str) -> Self {
        if url.starts_with("sqlite:") {
            Self::Sqlite
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Self::Postgres
        } else {
            Self::Mysql
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    fn create_table_sql(self) -> &'static str {
        match self {
            Self::Sqlite | Self::Postgres => {
                "CREATE TABLE IF NOT EXISTS dedup_items (item TEXT PRIMARY KEY)"
            }
            Self::Mysql => {
                "CREATE TABLE IF NOT EXISTS dedup_items (item VARCHAR(255) PRIMARY KEY)"
            }
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            Self::Sqlite => "INSERT OR IGNORE INTO dedup_items (item) VALUES (?)",
            Self::Mysql => "INSERT IGNORE INTO dedup_items (item) VALUES (?)",
            Self::Postgres => {
                "INSERT INTO dedup_items (item) VALUES ($1) ON CONFLICT (item) DO NOTHING"
            }
        }
    }

    fn contains_sql(self) -> &'static str {
        match self {
            Self::Sqlite | Self::Mysql => "SELECT 1 FROM dedup_items WHERE item = ? LIMIT 1",
            Self::Postgres => "SELECT 1 FROM dedup_items WHERE item = $1 LIMIT 1",
        }
    }
}

pub struct SqlStore {
    pool: AnyPool,
    dialect: SqlDialect,
}

impl SqlStore {
    /// Connect and bring up the schema, with startup-mode retry (fails fast
    /// if the connection string is wrong).
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let dialect = SqlDialect::from_url(connection_string);

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self { pool, dialect };

        if dialect == SqlDialect::Sqlite {
            store.enable_wal_mode().await?;
        }

        store.init_schema().await?;
        Ok(store)
    }

    /// Enable WAL journal mode for SQLite: readers stop blocking writers and
    /// commits need a single fsync. Safe with synchronous = NORMAL.
    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = self.dialect.create_table_sql();

        retry("sql_init_schema", &RetryConfig::startup(), || async {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BackendStore for SqlStore {
    async fn contains(&self, item: &str) -> Result<bool, StorageError> {
        let item = item.to_string();

        retry("sql_contains", &RetryConfig::query(), || async {
            let row = sqlx::query(self.dialect.contains_sql())
                .bind(&item)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(row.is_some())
        })
        .await
    }

    async fn store(&self, item: &str) -> Result<(), StorageError> {
        let item = item.to_string();

        retry("sql_store", &RetryConfig::query(), || async {
            sqlx::query(self.dialect.insert_sql())
                .bind(&item)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<u64, StorageError> {
        retry("sql_count", &RetryConfig::query(), || async {
            let row = sqlx::query("SELECT COUNT(*) FROM dedup_items")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            let count: i64 = row
                .try_get(0)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(count as u64)
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        retry("sql_clear", &RetryConfig::query(), || async {
            sqlx::query("DELETE FROM dedup_items")
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(())
        })
        .await
    }

    fn name(&self) -> &str {
        self.dialect.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_sqlite_url(name: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "dedup_sql_test_{}_{}.db",
            name,
            uuid::Uuid::new_v4()
        ));
        format!("sqlite://{}?mode=rwc", path.display())
    }

    #[test]
    fn test_dialect_detection() {
        assert_eq!(SqlDialect::from_url("sqlite:dedup.db"), SqlDialect::Sqlite);
        assert_eq!(
            SqlDialect::from_url("postgres://u:p@host/db"),
            SqlDialect::Postgres
        );
        assert_eq!(
            SqlDialect::from_url("postgresql://u:p@host/db"),
            SqlDialect::Postgres
        );
        assert_eq!(
            SqlDialect::from_url("mysql://u:p@host/db"),
            SqlDialect::Mysql
        );
    }

    #[tokio::test]
    async fn test_store_contains_count() {
        let store = SqlStore::new(&temp_sqlite_url("basic")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(!store.contains("order-1").await.unwrap());

        store.store("order-1").await.unwrap();

        assert!(store.contains("order-1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let store = SqlStore::new(&temp_sqlite_url("idempotent")).await.unwrap();

        store.store("same").await.unwrap();
        store.store("same").await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = SqlStore::new(&temp_sqlite_url("clear")).await.unwrap();

        for i in 0..5 {
            store.store(&format!("item-{}", i)).await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 5);

        store.clear().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(!store.contains("item-0").await.unwrap());
    }

    #[tokio::test]
    async fn test_contents_survive_reopen() {
        let url = temp_sqlite_url("reopen");

        {
            let store = SqlStore::new(&url).await.unwrap();
            store.store("durable-item").await.unwrap();
        }

        let reopened = SqlStore::new(&url).await.unwrap();
        assert!(reopened.contains("durable-item").await.unwrap());
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_name_reports_dialect() {
        let store = SqlStore::new(&temp_sqlite_url("name")).await.unwrap();
        assert_eq!(store.name(), "sqlite");
    }
}
