//! Blob metadata: binary content owned by the local store until its upload
//! is confirmed, after which the full-resolution bytes may be purged while
//! the row and thumbnail reference are retained for lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{BlobId, EntityId};

/// Storage state of a blob's bytes. Confirming an upload reclaims the full
/// bytes in the same step, so a blob is either still local or already
/// purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobState {
    /// Full bytes live in the local store only.
    Local,
    /// Remote copy confirmed and full-resolution bytes reclaimed; only
    /// metadata and the thumbnail reference remain.
    Purged,
}

impl BlobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Purged => "purged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "purged" => Some(Self::Purged),
            _ => None,
        }
    }
}

/// Metadata row for a stored blob. The bytes themselves are kept in the
/// store, keyed by `blob_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRecord {
    pub blob_id: BlobId,
    /// Owning entity; rewritten alongside the record when a temp id gets
    /// its remote mapping.
    pub entity_id: EntityId,
    pub content_type: String,
    pub byte_len: u64,
    pub state: BlobState,
    /// Compressed derivative kept after the full bytes are purged.
    pub thumbnail: Option<BlobId>,
    /// Asset id assigned by the remote store on upload.
    pub remote_asset_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlobRecord {
    pub fn new(entity_id: EntityId, content_type: impl Into<String>, byte_len: u64) -> Self {
        Self {
            blob_id: BlobId::new(),
            entity_id,
            content_type: content_type.into(),
            byte_len,
            state: BlobState::Local,
            thumbnail: None,
            remote_asset_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: BlobId) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }
}
