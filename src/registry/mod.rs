//! Relational bucket registry backed by SQLite.

mod buckets;
mod types;

pub use buckets::BucketRepository;
pub use types::*;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Shared registry storage.
#[derive(Debug, Clone)]
pub struct BucketStore {
    pool: SqlitePool,
}

impl BucketStore {
    /// Connect to the database at `url`, creating it if missing.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid registry database URL '{}'", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to open bucket registry")?;

        Self::from_pool(pool).await
    }

    /// Open a registry file, creating parent directories as needed.
    pub async fn from_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::connect(&format!("sqlite://{}", db_path.display()), 5).await
    }

    /// Private in-memory registry. A single connection keeps every query on
    /// the same database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.initialize_schema().await?;
        store.migrate_schema().await?;
        Ok(store)
    }

    /// Get a bucket repository
    pub fn buckets(&self) -> BucketRepository {
        BucketRepository::new(self.pool.clone())
    }

    /// Initialize the database schema
    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS storage_buckets (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    provider TEXT NOT NULL,
                    is_default INTEGER NOT NULL DEFAULT 0,
                    config_json TEXT NOT NULL,
                    created_by TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_storage_buckets_name ON storage_buckets(name)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Migrate schema for existing databases
    async fn migrate_schema(&self) -> Result<()> {
        self.migrate_add_column("description", "TEXT").await;
        self.migrate_add_column("is_default_chat", "INTEGER NOT NULL DEFAULT 0")
            .await;
        self.migrate_add_column("is_default_forms", "INTEGER NOT NULL DEFAULT 0")
            .await;

        // At most one bucket per default slot, enforced by the database too.
        for purpose in BucketPurpose::all() {
            let column = purpose.column();
            sqlx::query(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_storage_buckets_{column} \
                 ON storage_buckets({column}) WHERE {column} = 1"
            ))
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Helper to add a column if it doesn't exist
    async fn migrate_add_column(&self, column_name: &str, column_def: &str) {
        let check_query = format!("SELECT {} FROM storage_buckets LIMIT 1", column_name);
        let column_exists = sqlx::query(&check_query)
            .fetch_optional(&self.pool)
            .await
            .is_ok();

        if column_exists {
            tracing::debug!("Migration: {} column already exists", column_name);
            return;
        }

        tracing::debug!("Migration: {} column not found, adding it...", column_name);
        let alter_query = format!(
            "ALTER TABLE storage_buckets ADD COLUMN {} {}",
            column_name, column_def
        );

        match sqlx::query(&alter_query).execute(&self.pool).await {
            Ok(_) => tracing::debug!("Migration: Successfully added {} column", column_name),
            Err(e) => tracing::warn!("Migration: Column {} may already exist: {}", column_name, e),
        }
    }
}
