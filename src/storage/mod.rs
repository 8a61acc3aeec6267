//! Object storage providers.
//!
//! One contract, [`StorageProvider`], over two backend families:
//!
//! - **Native binding** for platforms that hand the process a bucket handle,
//!   with a credential fallback that talks to the same bucket over its
//!   S3-compatible endpoint
//! - **S3-compatible API** for AWS S3, MinIO and other S3 dialects
//!
//! Both are built on Apache OpenDAL.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BucketRepository                         │
//! │  - Bucket records, default slots, sealed configs            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ProviderFactory                          │
//! │  - Opens the config and builds the matching provider        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │  NativeBindingProvider   │──▶│  CompatibleApiProvider   │
//! │  (ObjectBinding)         │   │  (OpenDAL S3)            │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bucket_storage::storage::{CompatibleApiConfig, CompatibleApiProvider, UploadOptions};
//!
//! let config = CompatibleApiConfig::new("my-bucket", "us-east-1", "AKIA...", "secret")
//!     .with_endpoint("http://localhost:9000")
//!     .with_path_style(true);
//! let storage = CompatibleApiProvider::boxed(&config)?;
//!
//! storage
//!     .upload("docs/a.txt", "hello".into(), UploadOptions::default().with_content_type("text/plain"))
//!     .await?;
//!
//! let page = storage.list(Default::default()).await?;
//! for obj in page.objects {
//!     println!("{}: {}", obj.key, obj.size_display());
//! }
//! ```

mod binding;
mod body;
mod compatible;
mod error;
mod factory;
mod native;
mod operator;
mod sealing;
mod traits;
mod types;

pub use binding::{ObjectBinding, OperatorBinding, SharedBinding};
pub use body::{BodySource, ObjectBody, ObjectResponse, UploadBody};
pub use compatible::{native_family_endpoint, CompatibleApiProvider, NATIVE_FAMILY_REGION};
pub use error::{StorageError, StorageResult};
pub use factory::{NewBucketRequest, ProviderFactory};
pub use native::NativeBindingProvider;
pub use sealing::{ConfigCipher, KEY_LEN};
pub use traits::{BoxedStorageProvider, StorageProvider};
pub use types::*;
