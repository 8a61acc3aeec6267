//! Platform bindings.
//!
//! A binding is a credential-less, in-process handle to a blob store that
//! the hosting platform hands to the application. [`ObjectBinding`] is the
//! contract such a handle fulfils; [`OperatorBinding`] adapts any local
//! OpenDAL operator (memory or filesystem service) into one.

use async_trait::async_trait;
use opendal::layers::LoggingLayer;
use opendal::services::{Fs, Memory};
use opendal::Operator;
use std::path::Path;
use std::sync::Arc;

use super::body::{ObjectResponse, UploadBody};
use super::error::{StorageError, StorageResult};
use super::operator;
use super::types::{ListOptions, ListResult, StorageObject, UploadOptions};

/// Operations a platform binding exposes.
///
/// Keys handed to a binding are already normalized by the provider.
/// Authentication is the binding's own concern. Content type and user
/// metadata are best-effort: a binding whose backend cannot store them
/// drops them, and `get` then reports no content type.
#[async_trait]
pub trait ObjectBinding: Send + Sync {
    /// Name of the bound bucket, for logs.
    fn name(&self) -> &str;

    async fn put(&self, key: &str, body: UploadBody, options: &UploadOptions) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Option<ObjectResponse>>;

    async fn head(&self, key: &str) -> StorageResult<Option<StorageObject>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn list(&self, options: &ListOptions) -> StorageResult<ListResult>;
}

/// Shared binding handle.
pub type SharedBinding = Arc<dyn ObjectBinding>;

/// Binding backed by an in-process OpenDAL operator.
///
/// Uploads stream through an OpenDAL writer, so stream and blob bodies are
/// never held fully in memory by this binding.
#[derive(Clone)]
pub struct OperatorBinding {
    name: String,
    op: Operator,
}

impl OperatorBinding {
    pub fn new(name: impl Into<String>, op: Operator) -> Self {
        Self {
            name: name.into(),
            op,
        }
    }

    /// Volatile binding kept in process memory.
    pub fn memory(name: impl Into<String>) -> StorageResult<Self> {
        let op = Operator::new(Memory::default())
            .map_err(|e| StorageError::Configuration(format!("memory binding: {}", e)))?
            .layer(LoggingLayer::default())
            .finish();
        Ok(Self::new(name, op))
    }

    /// Binding rooted at a local directory.
    pub fn fs(name: impl Into<String>, root: &Path) -> StorageResult<Self> {
        let root = root.to_str().ok_or_else(|| {
            StorageError::Configuration(format!("binding root {:?} is not valid UTF-8", root))
        })?;
        let op = Operator::new(Fs::default().root(root))
            .map_err(|e| StorageError::Configuration(format!("filesystem binding: {}", e)))?
            .layer(LoggingLayer::default())
            .finish();
        Ok(Self::new(name, op))
    }

    /// Wrap into a shared handle.
    pub fn shared(self) -> SharedBinding {
        Arc::new(self)
    }
}

#[async_trait]
impl ObjectBinding for OperatorBinding {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &str, body: UploadBody, options: &UploadOptions) -> StorageResult<()> {
        match body {
            UploadBody::Bytes(data) => operator::write_all(&self.op, key, data, options).await,
            other => operator::write_streaming(&self.op, key, other, options).await,
        }
    }

    async fn get(&self, key: &str) -> StorageResult<Option<ObjectResponse>> {
        operator::open(&self.op, key).await
    }

    async fn head(&self, key: &str) -> StorageResult<Option<StorageObject>> {
        Ok(operator::head(&self.op, key)
            .await?
            .map(|metadata| operator::metadata_to_object(key, &metadata)))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        operator::delete(&self.op, key).await
    }

    async fn list(&self, options: &ListOptions) -> StorageResult<ListResult> {
        operator::list_page(&self.op, options).await
    }
}
