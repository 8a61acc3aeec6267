//! Bucket repository.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::types::{BucketPurpose, BucketUpdate, NewBucket, StorageBucket};

const SELECT_BUCKET: &str = "SELECT id, name, description, provider, is_default, is_default_chat, \
     is_default_forms, config_json, created_by, created_at, updated_at FROM storage_buckets";

/// Repository for bucket record CRUD operations.
///
/// Config blobs are stored exactly as handed in; sealing them is the
/// provider factory's job.
#[derive(Debug, Clone)]
pub struct BucketRepository {
    pool: SqlitePool,
}

impl BucketRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load all buckets, ordered by name.
    pub async fn list(&self) -> Result<Vec<StorageBucket>> {
        let buckets = sqlx::query_as::<_, StorageBucket>(&format!("{} ORDER BY name", SELECT_BUCKET))
            .fetch_all(&self.pool)
            .await?;
        Ok(buckets)
    }

    pub async fn get(&self, id: &str) -> Result<Option<StorageBucket>> {
        let bucket = sqlx::query_as::<_, StorageBucket>(&format!("{} WHERE id = ?1", SELECT_BUCKET))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load bucket '{}'", id))?;
        Ok(bucket)
    }

    /// The bucket holding the default flag for `purpose`, if any.
    pub async fn default_for(&self, purpose: BucketPurpose) -> Result<Option<StorageBucket>> {
        let bucket = sqlx::query_as::<_, StorageBucket>(&format!(
            "{} WHERE {} = 1 ORDER BY updated_at DESC LIMIT 1",
            SELECT_BUCKET,
            purpose.column()
        ))
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load default {} bucket", purpose))?;
        Ok(bucket)
    }

    /// Create a new bucket, taking over any default slots it asks for.
    pub async fn create(&self, new: NewBucket) -> Result<StorageBucket> {
        if self.exists_by_name(&new.name).await? {
            anyhow::bail!("A storage bucket with the name '{}' already exists", new.name);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for purpose in &new.default_for {
            Self::clear_default(&mut tx, *purpose).await?;
        }

        let flag = |purpose: BucketPurpose| new.default_for.contains(&purpose);
        sqlx::query(
            r#"
            INSERT INTO storage_buckets (id, name, description, provider, is_default, is_default_chat,
                is_default_forms, config_json, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.provider)
        .bind(flag(BucketPurpose::General))
        .bind(flag(BucketPurpose::Chat))
        .bind(flag(BucketPurpose::Forms))
        .bind(&new.config_json)
        .bind(&new.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!("Created bucket '{}' ({})", new.name, id);

        self.get(&id)
            .await?
            .context("Bucket vanished right after creation")
    }

    /// Update an existing bucket in place.
    pub async fn update(&self, id: &str, update: BucketUpdate) -> Result<StorageBucket> {
        let existing = self
            .get(id)
            .await?
            .with_context(|| format!("Bucket '{}' not found", id))?;

        if let Some(name) = &update.name {
            let clash = sqlx::query_scalar::<_, String>(
                "SELECT id FROM storage_buckets WHERE name = ?1 AND id != ?2",
            )
            .bind(name)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            if clash.is_some() {
                anyhow::bail!("A storage bucket with the name '{}' already exists", name);
            }
        }

        sqlx::query(
            r#"
            UPDATE storage_buckets
            SET name = ?2, description = ?3, provider = ?4, config_json = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.name.unwrap_or(existing.name))
        .bind(update.description.or(existing.description))
        .bind(update.provider.unwrap_or(existing.provider))
        .bind(update.config_json.unwrap_or(existing.config_json))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .with_context(|| format!("Bucket '{}' vanished during update", id))
    }

    /// Make `id` the only default bucket for `purpose`.
    ///
    /// Clear-then-set runs in one transaction so the slot is never held by
    /// two buckets.
    pub async fn set_default(&self, id: &str, purpose: BucketPurpose) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::clear_default(&mut tx, purpose).await?;

        let result = sqlx::query(&format!(
            "UPDATE storage_buckets SET {} = 1, updated_at = ?2 WHERE id = ?1",
            purpose.column()
        ))
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the clear.
            anyhow::bail!("Bucket '{}' not found", id);
        }

        tx.commit().await?;
        tracing::debug!("Bucket '{}' is now the default {} bucket", id, purpose);
        Ok(())
    }

    /// Release the default slot for `purpose`, whoever holds it.
    pub async fn clear_default_for(&self, purpose: BucketPurpose) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::clear_default(&mut tx, purpose).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete a bucket record. Whether the bucket still owns objects is the
    /// caller's check.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM storage_buckets WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if a bucket with the given name exists
    pub async fn exists_by_name(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storage_buckets WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn clear_default(tx: &mut Transaction<'_, Sqlite>, purpose: BucketPurpose) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE storage_buckets SET {column} = 0 WHERE {column} = 1",
            column = purpose.column()
        ))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
