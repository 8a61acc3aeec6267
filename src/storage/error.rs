//! Error taxonomy for the storage core.
//!
//! Errors fall into two classes. Configuration errors mean the bucket record
//! cannot produce a working provider and are fatal to the call. Transport
//! errors carry the backend's own error (status and message preserved) and
//! are never retried here. A missing key is not an error at all: `download`
//! returns `None` and `exists` returns `false`.

use thiserror::Error;

/// Result alias used throughout the storage core.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by providers, the factory and config sealing.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The bucket record cannot be turned into a working provider.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// The bucket record names a provider this crate does not implement.
    #[error("unsupported storage provider '{0}'")]
    UnsupportedProvider(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("bucket '{0}' not found")]
    BucketNotFound(String),

    #[error("upload of '{key}' failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: opendal::Error,
    },

    #[error("download of '{key}' failed: {source}")]
    Download {
        key: String,
        #[source]
        source: opendal::Error,
    },

    #[error("delete of '{key}' failed: {source}")]
    Delete {
        key: String,
        #[source]
        source: opendal::Error,
    },

    /// A metadata-only probe (`exists`, or the head request that precedes a
    /// download) failed for a reason other than "not found".
    #[error("metadata probe of '{key}' failed: {source}")]
    Probe {
        key: String,
        #[source]
        source: opendal::Error,
    },

    #[error("listing failed: {source}")]
    List {
        #[source]
        source: opendal::Error,
    },

    /// Reading an upload source (stream or blob file) failed.
    #[error("failed to read upload source: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage config blob: {0}")]
    Config(#[from] serde_json::Error),

    #[error("config encryption error: {0}")]
    Crypto(String),

    #[error("bucket registry error: {0}")]
    Registry(#[from] anyhow::Error),
}

impl StorageError {
    /// True for errors caused by the bucket record or the caller's input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StorageError::Configuration(_)
                | StorageError::UnsupportedProvider(_)
                | StorageError::InvalidKey(_)
                | StorageError::BucketNotFound(_)
                | StorageError::Config(_)
                | StorageError::Crypto(_)
        )
    }

    /// True for failures raised by the backend or the network.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StorageError::Upload { .. }
                | StorageError::Download { .. }
                | StorageError::Delete { .. }
                | StorageError::Probe { .. }
                | StorageError::List { .. }
        )
    }

    /// Message that is safe to hand back to an end user.
    ///
    /// Backend messages can contain endpoints, account ids or signed request
    /// details, so only the operation name survives.
    pub fn public_message(&self) -> &'static str {
        match self {
            StorageError::Upload { .. } => "File upload failed",
            StorageError::Download { .. } => "File download failed",
            StorageError::Delete { .. } => "File deletion failed",
            StorageError::Probe { .. } | StorageError::List { .. } => "Storage operation failed",
            StorageError::BucketNotFound(_) => "Storage bucket not found",
            StorageError::InvalidKey(_) => "Invalid file name",
            StorageError::Io(_) => "Could not read uploaded data",
            StorageError::Registry(_) => "Storage operation failed",
            _ => "Storage is not configured correctly",
        }
    }
}
