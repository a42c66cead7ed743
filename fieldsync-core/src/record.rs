//! Entity records: the caller-defined payload plus the bookkeeping the sync
//! engine needs. Records are never silently deleted; deletion is itself a
//! queued operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::EntityId;

/// Where a record stands relative to the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordLifecycle {
    /// Exists only on this device.
    LocalOnly,
    /// At least one operation for it has been dispatched.
    Uploading,
    /// Its creation has been acknowledged remotely.
    Uploaded,
    /// A subsequent successful operation confirmed the remote state.
    Verified,
}

impl RecordLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalOnly => "local_only",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local_only" => Some(Self::LocalOnly),
            "uploading" => Some(Self::Uploading),
            "uploaded" => Some(Self::Uploaded),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }
}

/// Context recorded when an operation for this record reaches terminal
/// failure, so the collaborator layer can show a per-item indicator instead
/// of silently losing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub message: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// A locally stored entity: opaque payload plus sync bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Current canonical id. Temporary until the first CREATE syncs, then
    /// rewritten to the remote id.
    pub entity_id: EntityId,
    /// Which remote collection the entity belongs to.
    pub entity_type: String,
    /// Tenant / grouping key.
    pub service_id: String,
    /// Caller-defined field map. Opaque to the engine.
    pub payload: Value,
    pub lifecycle: RecordLifecycle,
    pub sync_error: Option<SyncFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(
        entity_id: EntityId,
        entity_type: impl Into<String>,
        service_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            entity_type: entity_type.into(),
            service_id: service_id.into(),
            payload,
            lifecycle: RecordLifecycle::LocalOnly,
            sync_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a local edit. Field-level last-writer-wins: when both the
    /// current payload and the patch are JSON objects the patch keys are
    /// merged in, otherwise the patch replaces the payload wholesale.
    pub fn merge_payload(&mut self, patch: &Value) {
        match (&mut self.payload, patch) {
            (Value::Object(current), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    current.insert(key.clone(), value.clone());
                }
            }
            (current, incoming) => *current = incoming.clone(),
        }
        self.updated_at = Utc::now();
    }
}
