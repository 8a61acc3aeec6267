//! Storage types and configuration.
//!
//! This module defines the provider discriminator, the per-provider
//! connection parameters, and the plain data exchanged with providers
//! (object snapshots, upload options, list pages).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use super::error::StorageError;

/// Upper bound (and default) for the number of keys returned by one list call.
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Supported storage provider types.
///
/// This is the discriminator stored on a bucket record. It decides which
/// config variant the record's blob holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Blob store reached through a platform binding, or through its
    /// S3-compatible endpoint when the binding is disabled.
    Native,
    /// Any S3-compatible service reached with access key credentials.
    Compatible,
}

impl ProviderType {
    /// Get the display name for this provider type.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderType::Native => "Native binding",
            ProviderType::Compatible => "S3-compatible",
        }
    }

    /// The discriminator as stored in the registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Native => "native",
            ProviderType::Compatible => "compatible",
        }
    }

    /// Get all provider types.
    pub fn all() -> Vec<ProviderType> {
        vec![ProviderType::Native, ProviderType::Compatible]
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(ProviderType::Native),
            "compatible" => Ok(ProviderType::Compatible),
            other => Err(StorageError::UnsupportedProvider(other.to_string())),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Connection parameters for the binding-backed blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeBindingConfig {
    pub bucket_name: String,
    /// Route operations through the platform binding. When false the
    /// account credentials below are used against the S3-compatible endpoint.
    #[serde(default = "default_true")]
    pub use_native_binding: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

impl NativeBindingConfig {
    /// Config for binding mode.
    pub fn binding(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            use_native_binding: true,
            account_id: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Config for credential mode against the same backend family.
    pub fn credentials(
        bucket_name: impl Into<String>,
        account_id: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            use_native_binding: false,
            account_id: Some(account_id.into()),
            access_key_id: Some(access_key_id.into()),
            secret_access_key: Some(secret_access_key.into()),
        }
    }
}

/// Connection parameters for a generic S3-compatible service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibleApiConfig {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint URL (leave empty for AWS, set for MinIO and friends).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Use path-style addressing (required by MinIO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_path_style: Option<bool>,
}

impl CompatibleApiConfig {
    pub fn new(
        bucket_name: impl Into<String>,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            endpoint: None,
            force_path_style: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_path_style(mut self, path_style: bool) -> Self {
        self.force_path_style = Some(path_style);
        self
    }
}

/// Decrypted connection config of one bucket.
///
/// Serialized form is the bare variant body; the variant itself comes from
/// the bucket's provider discriminator, see [`StorageConfig::from_json`].
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Native(NativeBindingConfig),
    Compatible(CompatibleApiConfig),
}

impl StorageConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            StorageConfig::Native(_) => ProviderType::Native,
            StorageConfig::Compatible(_) => ProviderType::Compatible,
        }
    }

    pub fn bucket_name(&self) -> &str {
        match self {
            StorageConfig::Native(c) => &c.bucket_name,
            StorageConfig::Compatible(c) => &c.bucket_name,
        }
    }

    /// Parse a config blob as the variant named by `provider`.
    pub fn from_json(provider: ProviderType, json: &str) -> Result<Self, StorageError> {
        Ok(match provider {
            ProviderType::Native => StorageConfig::Native(serde_json::from_str(json)?),
            ProviderType::Compatible => StorageConfig::Compatible(serde_json::from_str(json)?),
        })
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(match self {
            StorageConfig::Native(c) => serde_json::to_string(c)?,
            StorageConfig::Compatible(c) => serde_json::to_string(c)?,
        })
    }

    /// Validate the configuration for its provider type.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Native(c) => {
                if c.bucket_name.trim().is_empty() {
                    return Err("Bucket name is required".to_string());
                }
                if !c.use_native_binding {
                    let missing: Vec<&str> = [
                        ("account_id", &c.account_id),
                        ("access_key_id", &c.access_key_id),
                        ("secret_access_key", &c.secret_access_key),
                    ]
                    .into_iter()
                    .filter(|(_, v)| v.as_deref().map(str::is_empty).unwrap_or(true))
                    .map(|(name, _)| name)
                    .collect();
                    if !missing.is_empty() {
                        return Err(format!(
                            "Credential mode requires {} when the native binding is disabled",
                            missing.join(", ")
                        ));
                    }
                }
                Ok(())
            }
            StorageConfig::Compatible(c) => {
                if c.bucket_name.trim().is_empty() {
                    return Err("Bucket name is required".to_string());
                }
                if c.region.trim().is_empty() {
                    return Err("Region is required".to_string());
                }
                if c.access_key_id.is_empty() || c.secret_access_key.is_empty() {
                    return Err("Access key id and secret access key are required".to_string());
                }
                if let Some(endpoint) = c.endpoint.as_deref().filter(|e| !e.is_empty()) {
                    url::Url::parse(endpoint)
                        .map_err(|e| format!("Invalid endpoint URL '{}': {}", endpoint, e))?;
                }
                Ok(())
            }
        }
    }
}

/// Snapshot of one stored object as returned by a listing or a head probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageObject {
    /// Key, unique within the bucket.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Content hash / etag as reported by the backend.
    pub etag: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

impl StorageObject {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
            metadata: None,
        }
    }

    /// Get a human-readable size string.
    pub fn size_display(&self) -> String {
        human_size(self.size)
    }
}

pub(crate) fn human_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1_073_741_824 => format!("{:.1} GB", b as f64 / 1_073_741_824.0),
        b if b >= 1_048_576 => format!("{:.1} MB", b as f64 / 1_048_576.0),
        b if b >= 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{} B", b),
    }
}

/// Options attached to a single upload. Replaces any prior metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

impl UploadOptions {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Request for one page of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub max_keys: Option<usize>,
    /// Opaque token from a previous page of the same listing.
    pub continuation_token: Option<String>,
}

impl ListOptions {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    /// Page size actually requested from the backend, clamped to `1..=1000`.
    pub fn effective_max_keys(&self) -> usize {
        self.max_keys.unwrap_or(DEFAULT_MAX_KEYS).clamp(1, DEFAULT_MAX_KEYS)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListResult {
    /// Objects in lexicographic key order.
    pub objects: Vec<StorageObject>,
    pub is_truncated: bool,
    /// Present iff `is_truncated`; pass it back verbatim for the next page.
    pub continuation_token: Option<String>,
}
