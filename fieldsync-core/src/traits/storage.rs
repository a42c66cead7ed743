use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::blob::BlobRecord;
use crate::errors::FieldsyncResult;
use crate::id::{BlobId, EntityId, OperationId, RemoteId, TempId};
use crate::op::{OpStatus, PendingOperation};
use crate::record::{EntityRecord, RecordLifecycle, SyncFailure};

/// CRUD over entity records, scoped by service/type/id. Writes are durable
/// across restart; reads never touch the network.
pub trait IRecordStore: Send + Sync {
    fn put_record(&self, record: &EntityRecord) -> FieldsyncResult<()>;
    fn get_record(&self, entity_id: &EntityId) -> FieldsyncResult<Option<EntityRecord>>;
    fn delete_record(&self, entity_id: &EntityId) -> FieldsyncResult<()>;
    fn list_records(
        &self,
        service_id: &str,
        entity_type: &str,
    ) -> FieldsyncResult<Vec<EntityRecord>>;

    fn set_lifecycle(
        &self,
        entity_id: &EntityId,
        lifecycle: RecordLifecycle,
    ) -> FieldsyncResult<()>;
    fn flag_sync_error(&self, entity_id: &EntityId, failure: &SyncFailure) -> FieldsyncResult<()>;

    /// Rewrite a record's canonical id (and its blobs' owner references)
    /// after the first successful CREATE sync.
    fn rewrite_entity_id(&self, temp: &TempId, remote: &RemoteId) -> FieldsyncResult<()>;
}

/// The pending operation log.
pub trait IOperationLog: Send + Sync {
    /// Append an operation. A no-op returning the existing id when one with
    /// the same idempotency key is already present with non-terminal status.
    fn enqueue(&self, op: &PendingOperation) -> FieldsyncResult<OperationId>;

    fn get_op(&self, id: &OperationId) -> FieldsyncResult<Option<PendingOperation>>;

    /// Operations eligible for dispatch at `now`: pending, past their
    /// backoff window, with every dependency synced. Ordered by priority
    /// descending, then creation order.
    fn eligible(&self, now: DateTime<Utc>, limit: usize)
        -> FieldsyncResult<Vec<PendingOperation>>;

    /// Transition pending → in_flight and bump the attempt counter.
    /// Returns the attempt count including this attempt.
    fn mark_in_flight(&self, id: &OperationId) -> FieldsyncResult<u32>;

    fn mark_synced(&self, id: &OperationId) -> FieldsyncResult<()>;

    /// Record a failure. Non-terminal returns the operation to pending with
    /// the given backoff window; terminal parks it at `failed`.
    fn mark_failed(
        &self,
        id: &OperationId,
        error: &str,
        next_eligible_at: DateTime<Utc>,
        terminal: bool,
    ) -> FieldsyncResult<()>;

    /// Direct dependents (operations with an edge onto `id`).
    fn dependents_of(&self, id: &OperationId) -> FieldsyncResult<Vec<OperationId>>;

    /// Non-terminal operations targeting the given entity.
    fn ops_for_target(&self, target: &EntityId) -> FieldsyncResult<Vec<PendingOperation>>;

    /// Withdraw a not-yet-dispatched operation together with its
    /// not-yet-dispatched transitive dependents. Returns how many
    /// operations were removed.
    fn remove_with_dependents(&self, id: &OperationId) -> FieldsyncResult<usize>;

    /// Crash resumption: return in_flight operations to pending.
    fn requeue_in_flight(&self) -> FieldsyncResult<usize>;

    fn count_by_status(&self, status: OpStatus) -> FieldsyncResult<usize>;
}

/// Persistent temp id ↔ remote id mapping. Append-only, never purged for
/// the lifetime of the local record: stale-reference repair can happen
/// arbitrarily long after the original sync.
pub trait IIdentityMap: Send + Sync {
    fn record_mapping(
        &self,
        temp: &TempId,
        remote: &RemoteId,
        entity_type: &str,
    ) -> FieldsyncResult<()>;
    fn resolve(&self, temp: &TempId) -> FieldsyncResult<Option<RemoteId>>;
    fn reverse_resolve(&self, remote: &RemoteId) -> FieldsyncResult<Option<TempId>>;
}

/// Blob bytes plus metadata, owned by the store until released.
pub trait IBlobStore: Send + Sync {
    fn put_blob(&self, record: &BlobRecord, bytes: &[u8]) -> FieldsyncResult<()>;
    fn get_blob(&self, id: &BlobId) -> FieldsyncResult<Option<BlobRecord>>;
    fn blob_bytes(&self, id: &BlobId) -> FieldsyncResult<Option<Vec<u8>>>;
    fn blobs_for_entity(&self, entity_id: &EntityId) -> FieldsyncResult<Vec<BlobRecord>>;

    /// Confirmed upload: record the remote asset id and reclaim the
    /// full-resolution bytes. The row and thumbnail reference remain.
    fn release_uploaded(&self, id: &BlobId, remote_asset_id: &str) -> FieldsyncResult<()>;

    fn remove_blobs_for_entity(&self, entity_id: &EntityId) -> FieldsyncResult<usize>;
}

/// Arbitrary keyed JSON slots for derived read caches.
pub trait ICacheSlots: Send + Sync {
    fn put_slot(
        &self,
        service_id: &str,
        entity_type: &str,
        key: &str,
        value: &Value,
    ) -> FieldsyncResult<()>;
    fn get_slot(
        &self,
        service_id: &str,
        entity_type: &str,
        key: &str,
    ) -> FieldsyncResult<Option<Value>>;
    fn remove_slot(&self, service_id: &str, entity_type: &str, key: &str) -> FieldsyncResult<()>;
}

/// The full durable local store, as the engine consumes it.
pub trait ILocalStore:
    IRecordStore + IOperationLog + IIdentityMap + IBlobStore + ICacheSlots
{
}

impl<T> ILocalStore for T where
    T: IRecordStore + IOperationLog + IIdentityMap + IBlobStore + ICacheSlots
{
}
