//! Encryption at rest for bucket config blobs.
//!
//! Configs carry access keys, so they are sealed with AES-256-GCM before the
//! registry stores them. Stored form: `enc:v1:` followed by
//! base64(nonce || ciphertext), with a fresh 96-bit nonce per seal.
//! The key lives with the provider factory; the registry only sees ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fmt;

use super::error::{StorageError, StorageResult};

const SEALED_PREFIX: &str = "enc:v1:";
const NONCE_SIZE: usize = 12;

/// Length of the config encryption key in bytes.
pub const KEY_LEN: usize = 32;

/// Seals and opens config blobs.
#[derive(Clone)]
pub struct ConfigCipher {
    key: [u8; KEY_LEN],
}

impl ConfigCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Generate a cipher with a random key.
    pub fn generate() -> Self {
        Self::new(rand::random())
    }

    /// Load a key from its base64 form.
    pub fn from_base64(encoded: &str) -> StorageResult<Self> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| StorageError::Crypto(format!("config key is not valid base64: {}", e)))?;
        let key: [u8; KEY_LEN] = raw.try_into().map_err(|raw: Vec<u8>| {
            StorageError::Crypto(format!(
                "config key must be {} bytes, got {}",
                KEY_LEN,
                raw.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    /// The key in base64, for provisioning.
    pub fn key_base64(&self) -> String {
        BASE64.encode(self.key)
    }

    pub fn is_sealed(stored: &str) -> bool {
        stored.starts_with(SEALED_PREFIX)
    }

    /// Encrypt a serialized config.
    pub fn seal(&self, plaintext: &str) -> StorageResult<String> {
        let cipher = self.cipher()?;
        let nonce_bytes: [u8; NONCE_SIZE] = rand::random();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| StorageError::Crypto(format!("encryption failed: {}", e)))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);
        Ok(format!("{}{}", SEALED_PREFIX, BASE64.encode(&combined)))
    }

    /// Decrypt a stored config.
    ///
    /// Blobs written before sealing existed are plain JSON; they are returned
    /// as-is with a warning so they can be re-sealed.
    pub fn open(&self, stored: &str) -> StorageResult<String> {
        let Some(encoded) = stored.strip_prefix(SEALED_PREFIX) else {
            tracing::warn!("Bucket config is stored unencrypted; re-save the bucket to seal it");
            return Ok(stored.to_string());
        };

        let combined = BASE64
            .decode(encoded)
            .map_err(|e| StorageError::Crypto(format!("sealed config is not valid base64: {}", e)))?;
        if combined.len() < NONCE_SIZE {
            return Err(StorageError::Crypto("sealed config is truncated".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                StorageError::Crypto("config decryption failed (wrong key or tampered data)".to_string())
            })?;

        String::from_utf8(plaintext)
            .map_err(|e| StorageError::Crypto(format!("decrypted config is not UTF-8: {}", e)))
    }

    fn cipher(&self) -> StorageResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| StorageError::Crypto(format!("invalid key: {}", e)))
    }
}

impl fmt::Debug for ConfigCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigCipher").field("key", &"<redacted>").finish()
    }
}
