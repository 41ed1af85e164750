use chrono::{DateTime, Utc};
use secu_files::FileMetadata;
use secu_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// Reference from a record to bytes in the media store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Media {
    pub id: RecordId,
    pub file: FileMetadata,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl_record!(Media, Media);
