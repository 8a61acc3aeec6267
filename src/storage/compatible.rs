//! S3-compatible storage provider using OpenDAL.
//!
//! Credential mode for any service speaking the S3 API:
//! - Amazon S3
//! - MinIO
//! - DigitalOcean Spaces
//! - The native blob store's own S3 endpoint, when its binding is disabled

use async_trait::async_trait;
use opendal::layers::LoggingLayer;
use opendal::services::S3;
use opendal::Operator;

use super::body::{ObjectResponse, UploadBody};
use super::error::{StorageError, StorageResult};
use super::operator;
use super::traits::{BoxedStorageProvider, StorageProvider};
use super::types::{
    human_size, CompatibleApiConfig, ListOptions, ListResult, ProviderType, StorageConfig,
    UploadOptions,
};

/// Region the native blob store's S3 endpoint expects.
pub const NATIVE_FAMILY_REGION: &str = "auto";

/// S3 endpoint of the native blob store for an account.
pub fn native_family_endpoint(account_id: &str) -> String {
    format!("https://{}.r2.cloudflarestorage.com", account_id)
}

/// Resolved client settings, whichever config variant they came from.
#[derive(Debug, Clone, PartialEq)]
struct ClientSettings {
    bucket: String,
    region: String,
    endpoint: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    path_style: bool,
}

/// S3-compatible provider implementation.
///
/// Uploads are sent as one PUT: stream and blob bodies are drained into
/// memory first and no multipart upload is attempted, so object size is
/// bounded by available memory.
pub struct CompatibleApiProvider {
    bucket: String,
    region: String,
    endpoint: Option<String>,
    op: Operator,
}

impl CompatibleApiProvider {
    /// Create a provider for a generic S3-compatible config.
    pub fn new(config: &CompatibleApiConfig) -> StorageResult<Self> {
        StorageConfig::Compatible(config.clone())
            .validate()
            .map_err(StorageError::Configuration)?;

        Self::from_settings(ClientSettings {
            bucket: config.bucket_name.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone().filter(|e| !e.is_empty()),
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            path_style: config.force_path_style.unwrap_or(false),
        })
    }

    /// Create a provider for the native blob store's S3 endpoint.
    pub fn for_native_family(
        bucket: &str,
        account_id: &str,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> StorageResult<Self> {
        Self::from_settings(ClientSettings {
            bucket: bucket.to_string(),
            region: NATIVE_FAMILY_REGION.to_string(),
            endpoint: Some(native_family_endpoint(account_id)),
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            path_style: true,
        })
    }

    /// Create a boxed provider.
    pub fn boxed(config: &CompatibleApiConfig) -> StorageResult<BoxedStorageProvider> {
        Ok(Box::new(Self::new(config)?))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn from_settings(settings: ClientSettings) -> StorageResult<Self> {
        let op = Self::build_operator(&settings)?;
        Ok(Self {
            bucket: settings.bucket,
            region: settings.region,
            endpoint: settings.endpoint,
            op,
        })
    }

    /// Build the OpenDAL operator.
    fn build_operator(settings: &ClientSettings) -> StorageResult<Operator> {
        let mut builder = S3::default()
            .bucket(&settings.bucket)
            .region(&settings.region)
            .access_key_id(&settings.access_key_id)
            .secret_access_key(&settings.secret_access_key)
            // Only the bucket's own credentials; never ambient env or instance metadata.
            .disable_config_load()
            .disable_ec2_metadata();

        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint(endpoint);
        }

        if !settings.path_style {
            builder = builder.enable_virtual_host_style();
        }

        let op = Operator::new(builder)
            .map_err(|e| {
                StorageError::Configuration(format!(
                    "cannot build S3 client for bucket '{}': {}",
                    settings.bucket, e
                ))
            })?
            .layer(LoggingLayer::default())
            .finish();

        Ok(op)
    }
}

#[async_trait]
impl StorageProvider for CompatibleApiProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Compatible
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
        let key = operator::normalize_key(key)?;
        let data = body.into_bytes().await?;
        tracing::debug!(
            "Uploading {} to s3://{}/{}",
            human_size(data.len() as u64),
            self.bucket,
            key
        );
        operator::write_all(&self.op, key, data, &options).await
    }

    async fn download(&self, key: &str) -> StorageResult<Option<ObjectResponse>> {
        let key = operator::normalize_key(key)?;
        let response = operator::open(&self.op, key).await?;
        if response.is_none() {
            tracing::debug!("s3://{}/{} not found", self.bucket, key);
        }
        Ok(response)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = operator::normalize_key(key)?;
        operator::delete(&self.op, key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let key = operator::normalize_key(key)?;
        Ok(operator::head(&self.op, key).await?.is_some())
    }

    async fn list(&self, options: ListOptions) -> StorageResult<ListResult> {
        operator::list_page(&self.op, &options).await
    }

    async fn test_connection(&self) -> bool {
        match self.list(ListOptions::default().with_max_keys(1)).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Connection test for bucket '{}' failed: {}", self.bucket, e);
                false
            }
        }
    }
}
