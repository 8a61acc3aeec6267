//! Bucket record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three system-wide default slots a bucket can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketPurpose {
    General,
    Chat,
    Forms,
}

impl BucketPurpose {
    pub fn all() -> [BucketPurpose; 3] {
        [BucketPurpose::General, BucketPurpose::Chat, BucketPurpose::Forms]
    }

    /// Column holding this purpose's default flag.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            BucketPurpose::General => "is_default",
            BucketPurpose::Chat => "is_default_chat",
            BucketPurpose::Forms => "is_default_forms",
        }
    }
}

impl std::fmt::Display for BucketPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BucketPurpose::General => "general",
            BucketPurpose::Chat => "chat",
            BucketPurpose::Forms => "forms",
        };
        write!(f, "{}", name)
    }
}

/// A logical bucket as persisted by the registry.
///
/// `provider` is the raw stored discriminator and `config_json` the sealed
/// config blob; the provider factory interprets both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StorageBucket {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub provider: String,
    pub is_default: bool,
    pub is_default_chat: bool,
    pub is_default_forms: bool,
    pub config_json: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StorageBucket {
    pub fn is_default_for(&self, purpose: BucketPurpose) -> bool {
        match purpose {
            BucketPurpose::General => self.is_default,
            BucketPurpose::Chat => self.is_default_chat,
            BucketPurpose::Forms => self.is_default_forms,
        }
    }
}

/// Input for creating a bucket record. `config_json` must already be sealed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBucket {
    pub name: String,
    pub description: Option<String>,
    pub provider: String,
    pub config_json: String,
    pub created_by: Option<String>,
    /// Default slots this bucket takes over on creation.
    pub default_for: Vec<BucketPurpose>,
}

/// In-place update of a bucket record. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub config_json: Option<String>,
}
