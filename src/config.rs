//! Process settings read from the environment.

use std::env;

use crate::registry::BucketStore;
use crate::storage::{ConfigCipher, ProviderFactory, StorageError, StorageResult};

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const CONFIG_KEY_VAR: &str = "BUCKET_STORAGE_CONFIG_KEY";
pub const MAX_CONNECTIONS_VAR: &str = "BUCKET_STORAGE_DB_MAX_CONNECTIONS";

const DEFAULT_DATABASE_URL: &str = "sqlite://bucket-storage.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone)]
pub struct StorageSettings {
    pub database_url: String,
    /// Base64 config key. `None` means configs cannot be sealed or opened.
    pub config_key: Option<String>,
    pub max_connections: u32,
}

impl StorageSettings {
    /// Load settings, reading a `.env` file first if one exists.
    pub fn from_env() -> StorageResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StorageResult<Self> {
        let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
            Some(raw) => raw.trim().parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                StorageError::Configuration(format!(
                    "{} must be a positive integer, got '{}'",
                    MAX_CONNECTIONS_VAR, raw
                ))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url: lookup(DATABASE_URL_VAR)
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            config_key: lookup(CONFIG_KEY_VAR).filter(|key| !key.trim().is_empty()),
            max_connections,
        })
    }

    /// The config cipher, if a key is configured.
    pub fn cipher(&self) -> StorageResult<ConfigCipher> {
        let key = self.config_key.as_deref().ok_or_else(|| {
            StorageError::Configuration(format!("{} is not set", CONFIG_KEY_VAR))
        })?;
        ConfigCipher::from_base64(key)
    }

    /// Open the registry and build a factory over it.
    pub async fn connect(&self) -> StorageResult<ProviderFactory> {
        let cipher = self.cipher()?;
        let store = BucketStore::connect(&self.database_url, self.max_connections).await?;
        tracing::info!("Bucket registry ready at {}", self.database_url);
        Ok(ProviderFactory::new(store.buckets(), cipher))
    }
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("database_url", &self.database_url)
            .field("config_key", &self.config_key.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}
