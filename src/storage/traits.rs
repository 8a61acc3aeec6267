//! Storage provider traits.
//!
//! [`StorageProvider`] is the capability contract every backend implements.
//! Callers hold a [`BoxedStorageProvider`] and never learn which backend
//! answers.

use async_trait::async_trait;

use super::body::{ObjectResponse, UploadBody};
use super::error::StorageResult;
use super::types::{ListOptions, ListResult, ProviderType, StorageObject, UploadOptions};

/// Core trait for storage providers.
///
/// Every operation is an independent network call; there is no required
/// ordering between them and no internal timeout. Dropping the returned
/// future cancels the call.
///
/// # Example
///
/// ```ignore
/// use bucket_storage::storage::{ListOptions, UploadOptions};
///
/// let provider = factory.provider_for(&bucket_id).await?;
/// provider
///     .upload("forms/42.json", body.into(), UploadOptions::default().with_content_type("application/json"))
///     .await?;
///
/// if let Some(object) = provider.download("forms/42.json").await? {
///     stream_to_client(object.body).await?;
/// }
/// ```
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the provider type for this instance.
    fn provider_type(&self) -> ProviderType;

    /// Physical bucket name this provider targets.
    fn bucket_name(&self) -> &str;

    /// Create or fully overwrite the object at `key`.
    async fn upload(&self, key: &str, body: UploadBody, options: UploadOptions)
        -> StorageResult<()>;

    /// Open the object at `key` for streaming.
    ///
    /// Returns `Ok(None)` when the key does not exist. The body is not
    /// buffered; the caller drains it.
    async fn download(&self, key: &str) -> StorageResult<Option<ObjectResponse>>;

    /// Delete the object at `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Metadata-only existence probe.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Fetch one page of objects.
    async fn list(&self, options: ListOptions) -> StorageResult<ListResult>;

    /// Cheapest possible read against the bucket. Never errors; an empty
    /// bucket is a success.
    async fn test_connection(&self) -> bool;

    /// Follow continuation tokens until the listing is exhausted.
    async fn list_all(&self, prefix: Option<&str>) -> StorageResult<Vec<StorageObject>> {
        let mut options = ListOptions {
            prefix: prefix.map(str::to_string),
            ..ListOptions::default()
        };
        let mut objects = Vec::new();
        loop {
            let page = self.list(options.clone()).await?;
            objects.extend(page.objects);
            match page.continuation_token {
                Some(token) if page.is_truncated => options.continuation_token = Some(token),
                _ => return Ok(objects),
            }
        }
    }
}

/// A boxed storage provider for dynamic dispatch.
pub type BoxedStorageProvider = Box<dyn StorageProvider>;
