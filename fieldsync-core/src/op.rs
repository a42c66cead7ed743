//! Pending operations: immutable intent records describing a remote mutation
//! that has not completed yet, with dependency edges by operation id so the
//! graph survives process restart.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{BlobId, EntityId, OperationId};

/// Dispatch priority bands. Creates outrank everything so a parent gets its
/// remote id before equal-priority independent work competes for slots.
pub const PRIORITY_CREATE: i64 = 20;
pub const PRIORITY_MUTATE: i64 = 10;
pub const PRIORITY_UPLOAD: i64 = 0;

/// What the operation intends to do remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Update,
    Delete,
    UploadBlob,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::UploadBlob => "upload_blob",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "upload_blob" => Some(Self::UploadBlob),
            _ => None,
        }
    }

    /// Default priority band for this kind.
    pub fn default_priority(&self) -> i64 {
        match self {
            Self::Create => PRIORITY_CREATE,
            Self::Update | Self::Delete => PRIORITY_MUTATE,
            Self::UploadBlob => PRIORITY_UPLOAD,
        }
    }
}

/// Operation state machine: `pending → in_flight → {synced | pending}` with
/// terminal `failed` reached only on a non-retryable error or attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Pending,
    InFlight,
    Synced,
    Failed,
}

impl OpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Synced | Self::Failed)
    }
}

/// An intended remote mutation waiting in the operation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperation {
    pub operation_id: OperationId,
    pub kind: OpKind,
    /// May be a temporary id; resolved via the identity map at dispatch time.
    pub target: EntityId,
    pub entity_type: String,
    pub service_id: String,
    /// For create/update: the fields to send. For upload_blob: metadata.
    pub payload: Value,
    /// Set only for `UploadBlob`.
    pub blob_id: Option<BlobId>,
    /// Operations that must be `synced` before this one may dispatch.
    pub dependencies: BTreeSet<OperationId>,
    pub status: OpStatus,
    pub priority: i64,
    pub attempt_count: u32,
    pub next_eligible_at: DateTime<Utc>,
    /// Deterministic key derived from target + content; duplicate enqueues
    /// of the same logical intent are absorbed on this key.
    pub idempotency_key: String,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Creation order, assigned by the store on insert. FIFO within a
    /// priority band is ordered on this, so it survives restart.
    pub seq: i64,
}

impl PendingOperation {
    pub fn new(
        kind: OpKind,
        target: EntityId,
        entity_type: impl Into<String>,
        service_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        let entity_type = entity_type.into();
        let service_id = service_id.into();
        let now = Utc::now();
        let idempotency_key =
            idempotency_key(kind, &target, &entity_type, &service_id, &payload, None);
        Self {
            operation_id: OperationId::new(),
            kind,
            target,
            entity_type,
            service_id,
            payload,
            blob_id: None,
            dependencies: BTreeSet::new(),
            status: OpStatus::Pending,
            priority: kind.default_priority(),
            attempt_count: 0,
            next_eligible_at: now,
            idempotency_key,
            last_error: None,
            created_at: now,
            seq: 0,
        }
    }

    /// Attach the blob this operation uploads. Re-derives the idempotency
    /// key since the blob id is part of the logical intent.
    pub fn with_blob(mut self, blob_id: BlobId) -> Self {
        self.blob_id = Some(blob_id);
        self.idempotency_key = idempotency_key(
            self.kind,
            &self.target,
            &self.entity_type,
            &self.service_id,
            &self.payload,
            Some(blob_id),
        );
        self
    }

    pub fn with_dependency(mut self, dep: OperationId) -> Self {
        self.dependencies.insert(dep);
        self
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = OperationId>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// Derive the deterministic idempotency key for a logical intent.
///
/// Same kind + target + scope + content always hashes to the same key, so a
/// crash-and-retry of the caller never produces a second remote record.
pub fn idempotency_key(
    kind: OpKind,
    target: &EntityId,
    entity_type: &str,
    service_id: &str,
    payload: &Value,
    blob_id: Option<BlobId>,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\x00");
    hasher.update(target.to_string().as_bytes());
    hasher.update(b"\x00");
    hasher.update(entity_type.as_bytes());
    hasher.update(b"\x00");
    hasher.update(service_id.as_bytes());
    hasher.update(b"\x00");
    hasher.update(payload.to_string().as_bytes());
    if let Some(blob) = blob_id {
        hasher.update(b"\x00");
        hasher.update(blob.to_string().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
