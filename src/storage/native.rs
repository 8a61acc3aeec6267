//! Native blob store provider.
//!
//! The transport is picked once, at construction:
//!
//! - binding requested and supplied: operations go through the binding;
//! - binding requested but missing: every operation fails with a
//!   configuration error and nothing touches the network;
//! - binding disabled: operations are delegated to a credential-mode
//!   [`CompatibleApiProvider`] aimed at the store's S3 endpoint.

use async_trait::async_trait;

use super::binding::SharedBinding;
use super::body::{ObjectResponse, UploadBody};
use super::compatible::CompatibleApiProvider;
use super::error::{StorageError, StorageResult};
use super::operator;
use super::traits::{BoxedStorageProvider, StorageProvider};
use super::types::{
    ListOptions, ListResult, NativeBindingConfig, ProviderType, StorageConfig, UploadOptions,
};

/// Transport strategy of a [`NativeBindingProvider`].
enum NativeTransport {
    Bound(SharedBinding),
    Unbound,
    Delegated(CompatibleApiProvider),
}

/// Provider for the binding-backed blob store.
pub struct NativeBindingProvider {
    bucket: String,
    transport: NativeTransport,
}

impl NativeBindingProvider {
    /// Create a provider from a native config and the binding the host
    /// supplied, if any.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the binding is disabled and the
    /// account credentials are incomplete. A requested-but-missing binding
    /// does not fail here; it fails at the first operation.
    pub fn new(config: &NativeBindingConfig, binding: Option<SharedBinding>) -> StorageResult<Self> {
        StorageConfig::Native(config.clone())
            .validate()
            .map_err(StorageError::Configuration)?;

        let transport = if config.use_native_binding {
            match binding {
                Some(binding) => {
                    tracing::debug!(
                        "Bucket '{}' bound to binding '{}'",
                        config.bucket_name,
                        binding.name()
                    );
                    NativeTransport::Bound(binding)
                }
                None => {
                    tracing::warn!(
                        "Bucket '{}' requests the native binding but none is available",
                        config.bucket_name
                    );
                    NativeTransport::Unbound
                }
            }
        } else {
            // validate() has already checked all three fields are present.
            let field = |v: &Option<String>| v.clone().unwrap_or_default();
            NativeTransport::Delegated(CompatibleApiProvider::for_native_family(
                &config.bucket_name,
                &field(&config.account_id),
                &field(&config.access_key_id),
                &field(&config.secret_access_key),
            )?)
        };

        Ok(Self {
            bucket: config.bucket_name.clone(),
            transport,
        })
    }

    /// Create a boxed provider.
    pub fn boxed(
        config: &NativeBindingConfig,
        binding: Option<SharedBinding>,
    ) -> StorageResult<BoxedStorageProvider> {
        Ok(Box::new(Self::new(config, binding)?))
    }

    /// True when operations go through a platform binding.
    pub fn is_bound(&self) -> bool {
        matches!(self.transport, NativeTransport::Bound(_))
    }

    /// True when operations are delegated to the S3-compatible endpoint.
    pub fn is_delegated(&self) -> bool {
        matches!(self.transport, NativeTransport::Delegated(_))
    }

    fn missing_binding(&self) -> StorageError {
        StorageError::Configuration(format!(
            "bucket '{}' is configured for the native binding but no binding was supplied; \
             supply the binding to the provider factory or set use_native_binding = false \
             and provide account_id, access_key_id and secret_access_key",
            self.bucket
        ))
    }
}

#[async_trait]
impl StorageProvider for NativeBindingProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Native
    }

    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        key: &str,
        body: UploadBody,
        options: UploadOptions,
    ) -> StorageResult<()> {
        match &self.transport {
            NativeTransport::Bound(binding) => {
                let key = operator::normalize_key(key)?;
                tracing::debug!("Uploading '{}' through binding '{}'", key, binding.name());
                binding.put(key, body, &options).await
            }
            NativeTransport::Unbound => Err(self.missing_binding()),
            NativeTransport::Delegated(inner) => inner.upload(key, body, options).await,
        }
    }

    async fn download(&self, key: &str) -> StorageResult<Option<ObjectResponse>> {
        match &self.transport {
            NativeTransport::Bound(binding) => binding.get(operator::normalize_key(key)?).await,
            NativeTransport::Unbound => Err(self.missing_binding()),
            NativeTransport::Delegated(inner) => inner.download(key).await,
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match &self.transport {
            NativeTransport::Bound(binding) => binding.delete(operator::normalize_key(key)?).await,
            NativeTransport::Unbound => Err(self.missing_binding()),
            NativeTransport::Delegated(inner) => inner.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match &self.transport {
            NativeTransport::Bound(binding) => Ok(binding
                .head(operator::normalize_key(key)?)
                .await?
                .is_some()),
            NativeTransport::Unbound => Err(self.missing_binding()),
            NativeTransport::Delegated(inner) => inner.exists(key).await,
        }
    }

    async fn list(&self, options: ListOptions) -> StorageResult<ListResult> {
        match &self.transport {
            NativeTransport::Bound(binding) => binding.list(&options).await,
            NativeTransport::Unbound => Err(self.missing_binding()),
            NativeTransport::Delegated(inner) => inner.list(options).await,
        }
    }

    async fn test_connection(&self) -> bool {
        match &self.transport {
            NativeTransport::Delegated(inner) => inner.test_connection().await,
            _ => match self.list(ListOptions::default().with_max_keys(1)).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("Connection test for bucket '{}' failed: {}", self.bucket, e);
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::binding::OperatorBinding;
    use bytes::Bytes;
    use futures::stream;
    use std::collections::HashSet;

    fn bound_provider() -> NativeBindingProvider {
        let binding = OperatorBinding::memory("b1").unwrap().shared();
        NativeBindingProvider::new(&NativeBindingConfig::binding("b1"), Some(binding)).unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_download_hello() {
        let provider = bound_provider();
        assert!(provider.is_bound());

        provider
            .upload("a.txt", "hello".into(), UploadOptions::default())
            .await
            .unwrap();

        let object = provider.download("a.txt").await.unwrap().unwrap();
        assert_eq!(object.content_length, Some(5));
        assert_eq!(object.into_bytes().await.unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_all_upload_shapes_round_trip() {
        let provider = bound_provider();
        let data = b"the same bytes, three ways".to_vec();

        provider
            .upload("buffer.bin", data.clone().into(), UploadOptions::default())
            .await
            .unwrap();

        let chunks: Vec<std::io::Result<Bytes>> = data
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        provider
            .upload(
                "stream.bin",
                UploadBody::stream(stream::iter(chunks)),
                UploadOptions::default(),
            )
            .await
            .unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &data).unwrap();
        provider
            .upload("blob.bin", UploadBody::blob(file.path()), UploadOptions::default())
            .await
            .unwrap();

        for key in ["buffer.bin", "stream.bin", "blob.bin"] {
            let object = provider.download(key).await.unwrap().unwrap();
            assert_eq!(object.into_bytes().await.unwrap().as_ref(), data.as_slice());
        }
    }

    #[tokio::test]
    async fn test_exists_tracks_upload_and_delete() {
        let provider = bound_provider();
        assert!(!provider.exists("k.txt").await.unwrap());

        provider
            .upload("k.txt", "v".into(), UploadOptions::default())
            .await
            .unwrap();
        assert!(provider.exists("k.txt").await.unwrap());

        provider.delete("k.txt").await.unwrap();
        assert!(!provider.exists("k.txt").await.unwrap());
        // A second delete is not an error.
        provider.delete("k.txt").await.unwrap();
        assert!(provider.download("k.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_overwrites() {
        let provider = bound_provider();
        provider
            .upload("k.txt", "first version".into(), UploadOptions::default())
            .await
            .unwrap();
        provider
            .upload("k.txt", "second".into(), UploadOptions::default())
            .await
            .unwrap();
        let object = provider.download("k.txt").await.unwrap().unwrap();
        assert_eq!(object.into_bytes().await.unwrap().as_ref(), b"second");
    }

    #[tokio::test]
    async fn test_list_pages_one_at_a_time() {
        let provider = bound_provider();
        for key in ["x/1", "x/2", "x/3"] {
            provider
                .upload(key, key.to_string().into(), UploadOptions::default())
                .await
                .unwrap();
        }

        let first = provider
            .list(ListOptions::default().with_max_keys(1))
            .await
            .unwrap();
        assert_eq!(first.objects.len(), 1);
        assert!(first.is_truncated);
        let token = first.continuation_token.clone().unwrap();
        assert!(!token.is_empty());

        let second = provider
            .list(ListOptions::default().with_max_keys(1).with_continuation_token(token))
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_ne!(second.objects[0].key, first.objects[0].key);

        let all: HashSet<String> = provider
            .list_all(Some("x/"))
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_binding_fails_every_operation() {
        let provider = NativeBindingProvider::new(&NativeBindingConfig::binding("b1"), None).unwrap();
        assert!(!provider.is_bound());

        let err = provider
            .upload("a.txt", "hello".into(), UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(ref msg) if msg.contains("binding")));

        assert!(provider.download("a.txt").await.unwrap_err().is_configuration());
        assert!(provider.delete("a.txt").await.unwrap_err().is_configuration());
        assert!(provider.exists("a.txt").await.unwrap_err().is_configuration());
        assert!(provider.list(ListOptions::default()).await.unwrap_err().is_configuration());
        assert!(!provider.test_connection().await);
    }

    #[test]
    fn test_disabled_binding_delegates_to_credentials() {
        let config = NativeBindingConfig::credentials("b1", "acct", "key", "secret");
        let provider = NativeBindingProvider::new(&config, None).unwrap();
        assert!(provider.is_delegated());
        assert_eq!(provider.provider_type(), ProviderType::Native);
    }

    #[test]
    fn test_disabled_binding_without_credentials_is_rejected() {
        let mut config = NativeBindingConfig::binding("b1");
        config.use_native_binding = false;
        let binding = OperatorBinding::memory("b1").unwrap().shared();
        // A supplied binding does not rescue an explicit credential-mode config.
        assert!(matches!(
            NativeBindingProvider::new(&config, Some(binding)),
            Err(StorageError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_bucket_connection_test_succeeds() {
        assert!(bound_provider().test_connection().await);
    }
}
