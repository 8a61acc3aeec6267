//! Provider factory.
//!
//! Resolves a logical bucket record into a concrete
//! [`StorageProvider`](super::StorageProvider). The
//! factory is also the encryption boundary: configs are sealed before the
//! registry persists them and opened only here, when a provider is built.

use crate::registry::{BucketPurpose, BucketRepository, BucketUpdate, NewBucket, StorageBucket};

use super::binding::SharedBinding;
use super::compatible::CompatibleApiProvider;
use super::error::{StorageError, StorageResult};
use super::native::NativeBindingProvider;
use super::sealing::ConfigCipher;
use super::traits::BoxedStorageProvider;
use super::types::{ProviderType, StorageConfig};

/// Request to register a new bucket with a plaintext config.
#[derive(Debug, Clone)]
pub struct NewBucketRequest {
    pub name: String,
    pub description: Option<String>,
    pub config: StorageConfig,
    pub created_by: Option<String>,
    pub default_for: Vec<BucketPurpose>,
}

/// Factory for creating storage providers from bucket records.
///
/// Holds handles only: the registry, the config key and the platform
/// binding if the host has one. Every call builds a fresh provider.
///
/// # Example
///
/// ```ignore
/// use bucket_storage::registry::{BucketPurpose, BucketStore};
/// use bucket_storage::storage::{ConfigCipher, ProviderFactory};
///
/// let store = BucketStore::connect("sqlite://buckets.db", 5).await?;
/// let factory = ProviderFactory::new(store.buckets(), ConfigCipher::from_base64(&key)?);
///
/// let provider = factory.default_provider(BucketPurpose::Forms).await?;
/// let page = provider.list(Default::default()).await?;
/// ```
#[derive(Clone)]
pub struct ProviderFactory {
    registry: BucketRepository,
    cipher: ConfigCipher,
    binding: Option<SharedBinding>,
}

impl ProviderFactory {
    pub fn new(registry: BucketRepository, cipher: ConfigCipher) -> Self {
        Self {
            registry,
            cipher,
            binding: None,
        }
    }

    /// Attach the platform binding handed over by the host.
    pub fn with_binding(mut self, binding: SharedBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Build the provider for a bucket record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the provider discriminator is unknown
    /// - the config blob cannot be decrypted or parsed
    /// - the config is invalid for its provider type
    pub fn create_provider(&self, bucket: &StorageBucket) -> StorageResult<BoxedStorageProvider> {
        let provider_type: ProviderType = bucket.provider.parse()?;
        let config = self.open_config(provider_type, &bucket.config_json)?;
        tracing::debug!(
            "Building {} provider for bucket '{}' ({})",
            provider_type,
            bucket.name,
            bucket.id
        );
        self.build(config)
    }

    /// Build a provider straight from a decrypted config.
    pub fn build(&self, config: StorageConfig) -> StorageResult<BoxedStorageProvider> {
        config.validate().map_err(StorageError::Configuration)?;

        match config {
            StorageConfig::Native(native) => {
                NativeBindingProvider::boxed(&native, self.binding.clone())
            }
            StorageConfig::Compatible(compatible) => CompatibleApiProvider::boxed(&compatible),
        }
    }

    /// Look up a bucket and build its provider.
    pub async fn provider_for(&self, bucket_id: &str) -> StorageResult<BoxedStorageProvider> {
        let bucket = self
            .get_bucket(bucket_id)
            .await?
            .ok_or_else(|| StorageError::BucketNotFound(bucket_id.to_string()))?;
        self.create_provider(&bucket)
    }

    /// Build the provider of the default bucket for `purpose`.
    pub async fn default_provider(
        &self,
        purpose: BucketPurpose,
    ) -> StorageResult<BoxedStorageProvider> {
        let bucket = self
            .get_default_bucket(purpose)
            .await?
            .ok_or_else(|| StorageError::BucketNotFound(format!("default {}", purpose)))?;
        self.create_provider(&bucket)
    }

    pub async fn get_bucket(&self, id: &str) -> StorageResult<Option<StorageBucket>> {
        Ok(self.registry.get(id).await?)
    }

    pub async fn get_default_bucket(
        &self,
        purpose: BucketPurpose,
    ) -> StorageResult<Option<StorageBucket>> {
        Ok(self.registry.default_for(purpose).await?)
    }

    pub async fn list_buckets(&self) -> StorageResult<Vec<StorageBucket>> {
        Ok(self.registry.list().await?)
    }

    /// Validate, seal and persist a new bucket.
    pub async fn register_bucket(&self, request: NewBucketRequest) -> StorageResult<StorageBucket> {
        request
            .config
            .validate()
            .map_err(StorageError::Configuration)?;

        let new = NewBucket {
            name: request.name,
            description: request.description,
            provider: request.config.provider_type().as_str().to_string(),
            config_json: self.seal_config(&request.config)?,
            created_by: request.created_by,
            default_for: request.default_for,
        };
        Ok(self.registry.create(new).await?)
    }

    /// Replace a bucket's config, re-sealing it. The provider discriminator
    /// follows the new config.
    pub async fn update_bucket_config(
        &self,
        bucket_id: &str,
        config: StorageConfig,
    ) -> StorageResult<StorageBucket> {
        config.validate().map_err(StorageError::Configuration)?;
        if self.get_bucket(bucket_id).await?.is_none() {
            return Err(StorageError::BucketNotFound(bucket_id.to_string()));
        }

        let update = BucketUpdate {
            provider: Some(config.provider_type().as_str().to_string()),
            config_json: Some(self.seal_config(&config)?),
            ..BucketUpdate::default()
        };
        Ok(self.registry.update(bucket_id, update).await?)
    }

    /// Serialize and encrypt a config for persistence.
    pub fn seal_config(&self, config: &StorageConfig) -> StorageResult<String> {
        self.cipher.seal(&config.to_json()?)
    }

    /// Decrypt and parse a stored config as the variant `provider` names.
    pub fn open_config(&self, provider: ProviderType, stored: &str) -> StorageResult<StorageConfig> {
        StorageConfig::from_json(provider, &self.cipher.open(stored)?)
    }

    /// Build a throwaway provider and run its connection test.
    pub async fn test_bucket(&self, bucket: &StorageBucket) -> StorageResult<bool> {
        let provider = self.create_provider(bucket)?;
        Ok(provider.test_connection().await)
    }

    /// Check if a provider discriminator is currently supported.
    pub fn is_supported(provider: &str) -> bool {
        provider.parse::<ProviderType>().is_ok()
    }

    /// Get a list of all supported provider types.
    pub fn supported_providers() -> Vec<ProviderType> {
        ProviderType::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BucketStore;
    use crate::storage::binding::OperatorBinding;
    use crate::storage::types::{CompatibleApiConfig, NativeBindingConfig, UploadOptions};

    async fn factory() -> ProviderFactory {
        let store = BucketStore::in_memory().await.unwrap();
        ProviderFactory::new(store.buckets(), ConfigCipher::generate())
    }

    fn native_request(name: &str, default_for: Vec<BucketPurpose>) -> NewBucketRequest {
        NewBucketRequest {
            name: name.to_string(),
            description: None,
            config: StorageConfig::Native(NativeBindingConfig::binding(name)),
            created_by: None,
            default_for,
        }
    }

    #[tokio::test]
    async fn test_registered_config_is_sealed() {
        let factory = factory().await;
        let config = CompatibleApiConfig::new("data", "us-east-1", "AKIA", "top-secret");
        let bucket = factory
            .register_bucket(NewBucketRequest {
                name: "b2".to_string(),
                description: None,
                config: StorageConfig::Compatible(config.clone()),
                created_by: Some("admin".to_string()),
                default_for: vec![],
            })
            .await
            .unwrap();

        assert_eq!(bucket.provider, "compatible");
        assert!(ConfigCipher::is_sealed(&bucket.config_json));
        assert!(!bucket.config_json.contains("top-secret"));
        assert_eq!(
            factory
                .open_config(ProviderType::Compatible, &bucket.config_json)
                .unwrap(),
            StorageConfig::Compatible(config)
        );
    }

    #[tokio::test]
    async fn test_provider_matches_discriminator() {
        let factory = factory().await;
        let bucket = factory
            .register_bucket(native_request("b1", vec![]))
            .await
            .unwrap();

        let provider = factory.provider_for(&bucket.id).await.unwrap();
        assert_eq!(provider.provider_type(), ProviderType::Native);
        assert_eq!(provider.bucket_name(), "b1");
    }

    #[tokio::test]
    async fn test_unknown_discriminator_is_rejected() {
        let factory = factory().await;
        let mut bucket = factory
            .register_bucket(native_request("b1", vec![]))
            .await
            .unwrap();
        bucket.provider = "gcs".to_string();

        let err = factory.create_provider(&bucket).err().unwrap();
        assert!(matches!(err, StorageError::UnsupportedProvider(ref p) if p == "gcs"));
        assert!(!ProviderFactory::is_supported("gcs"));
        assert!(ProviderFactory::is_supported("native"));
        assert_eq!(ProviderFactory::supported_providers().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_bucket() {
        let factory = factory().await;
        let err = factory.provider_for("nope").await.err().unwrap();
        assert!(matches!(err, StorageError::BucketNotFound(_)));
        let err = factory
            .default_provider(BucketPurpose::Chat)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::BucketNotFound(_)));
    }

    #[tokio::test]
    async fn test_default_provider_uses_binding() {
        let binding = OperatorBinding::memory("chat").unwrap().shared();
        let factory = factory().await.with_binding(binding);
        factory
            .register_bucket(native_request("chat", vec![BucketPurpose::Chat]))
            .await
            .unwrap();

        let provider = factory.default_provider(BucketPurpose::Chat).await.unwrap();
        provider
            .upload("m.txt", "hi".into(), UploadOptions::default())
            .await
            .unwrap();
        assert!(provider.exists("m.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_each_bucket_gets_its_own_provider() {
        let factory = factory().await;
        let first = factory
            .register_bucket(native_request("one", vec![]))
            .await
            .unwrap();
        let second = factory
            .register_bucket(native_request("two", vec![]))
            .await
            .unwrap();

        let p1 = factory.provider_for(&first.id).await.unwrap();
        let p2 = factory.provider_for(&second.id).await.unwrap();
        assert_eq!(p1.bucket_name(), "one");
        assert_eq!(p2.bucket_name(), "two");
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_persisted() {
        let factory = factory().await;
        let request = NewBucketRequest {
            name: "bad".to_string(),
            description: None,
            config: StorageConfig::Compatible(CompatibleApiConfig::new("", "us-east-1", "k", "s")),
            created_by: None,
            default_for: vec![],
        };
        assert!(matches!(
            factory.register_bucket(request).await,
            Err(StorageError::Configuration(_))
        ));
        assert!(factory.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_config_switches_provider() {
        let factory = factory().await;
        let bucket = factory
            .register_bucket(native_request("files", vec![]))
            .await
            .unwrap();

        let config = CompatibleApiConfig::new("files", "eu-west-1", "k", "s")
            .with_endpoint("http://127.0.0.1:9000")
            .with_path_style(true);
        let updated = factory
            .update_bucket_config(&bucket.id, StorageConfig::Compatible(config))
            .await
            .unwrap();
        assert_eq!(updated.id, bucket.id);
        assert_eq!(updated.provider, "compatible");
        assert!(ConfigCipher::is_sealed(&updated.config_json));

        let provider = factory.create_provider(&updated).unwrap();
        assert_eq!(provider.provider_type(), ProviderType::Compatible);

        let missing = factory
            .update_bucket_config("nope", StorageConfig::Native(NativeBindingConfig::binding("x")))
            .await;
        assert!(matches!(missing, Err(StorageError::BucketNotFound(_))));
    }

    #[tokio::test]
    async fn test_legacy_plaintext_config_still_loads() {
        let store = BucketStore::in_memory().await.unwrap();
        let factory = ProviderFactory::new(store.buckets(), ConfigCipher::generate());
        let bucket = store
            .buckets()
            .create(NewBucket {
                name: "legacy".to_string(),
                provider: "native".to_string(),
                config_json: r#"{"bucket_name":"legacy"}"#.to_string(),
                ..NewBucket::default()
            })
            .await
            .unwrap();

        let provider = factory.create_provider(&bucket).unwrap();
        assert_eq!(provider.bucket_name(), "legacy");
    }
}
