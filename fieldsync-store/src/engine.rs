//! StoreEngine — owns the connection pool and implements the full local
//! store interface consumed by the synchronization engine and the facade.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;

use fieldsync_core::blob::BlobRecord;
use fieldsync_core::errors::FieldsyncResult;
use fieldsync_core::id::{BlobId, EntityId, OperationId, RemoteId, TempId};
use fieldsync_core::op::{OpStatus, PendingOperation};
use fieldsync_core::record::{EntityRecord, RecordLifecycle, SyncFailure};
use fieldsync_core::traits::{
    IBlobStore, ICacheSlots, IIdentityMap, IOperationLog, IRecordStore,
};

use crate::migrations;
use crate::pool::ConnectionPool;
use crate::queries;

/// The durable local store. All writes go through the single writer; reads
/// use the pool's read ring when file-backed.
pub struct StoreEngine {
    pool: ConnectionPool,
}

impl StoreEngine {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path) -> FieldsyncResult<Self> {
        let engine = Self {
            pool: ConnectionPool::open(path, 4)?,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> FieldsyncResult<Self> {
        let engine = Self {
            pool: ConnectionPool::open_in_memory()?,
        };
        engine.initialize()?;
        Ok(engine)
    }

    fn initialize(&self) -> FieldsyncResult<()> {
        self.pool.with_writer(migrations::run_migrations)
    }

    fn with_reader<F, T>(&self, f: F) -> FieldsyncResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> FieldsyncResult<T>,
    {
        self.pool.with_reader(f)
    }
}

impl IRecordStore for StoreEngine {
    fn put_record(&self, record: &EntityRecord) -> FieldsyncResult<()> {
        self.pool
            .with_writer(|conn| queries::record_crud::put_record(conn, record))
    }

    fn get_record(&self, entity_id: &EntityId) -> FieldsyncResult<Option<EntityRecord>> {
        self.with_reader(|conn| queries::record_crud::get_record(conn, entity_id))
    }

    fn delete_record(&self, entity_id: &EntityId) -> FieldsyncResult<()> {
        self.pool
            .with_writer(|conn| queries::record_crud::delete_record(conn, entity_id))
    }

    fn list_records(
        &self,
        service_id: &str,
        entity_type: &str,
    ) -> FieldsyncResult<Vec<EntityRecord>> {
        self.with_reader(|conn| queries::record_crud::list_records(conn, service_id, entity_type))
    }

    fn set_lifecycle(
        &self,
        entity_id: &EntityId,
        lifecycle: RecordLifecycle,
    ) -> FieldsyncResult<()> {
        self.pool
            .with_writer(|conn| queries::record_crud::set_lifecycle(conn, entity_id, lifecycle))
    }

    fn flag_sync_error(&self, entity_id: &EntityId, failure: &SyncFailure) -> FieldsyncResult<()> {
        self.pool
            .with_writer(|conn| queries::record_crud::flag_sync_error(conn, entity_id, failure))
    }

    fn rewrite_entity_id(&self, temp: &TempId, remote: &RemoteId) -> FieldsyncResult<()> {
        self.pool
            .with_writer(|conn| queries::record_crud::rewrite_entity_id(conn, temp, remote))
    }
}

impl IOperationLog for StoreEngine {
    fn enqueue(&self, op: &PendingOperation) -> FieldsyncResult<OperationId> {
        self.pool
            .with_writer(|conn| queries::op_log::enqueue(conn, op))
    }

    fn get_op(&self, id: &OperationId) -> FieldsyncResult<Option<PendingOperation>> {
        self.with_reader(|conn| queries::op_log::get_op(conn, id))
    }

    fn eligible(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> FieldsyncResult<Vec<PendingOperation>> {
        self.with_reader(|conn| queries::op_log::eligible(conn, now, limit))
    }

    fn mark_in_flight(&self, id: &OperationId) -> FieldsyncResult<u32> {
        self.pool
            .with_writer(|conn| queries::op_log::mark_in_flight(conn, id))
    }

    fn mark_synced(&self, id: &OperationId) -> FieldsyncResult<()> {
        self.pool
            .with_writer(|conn| queries::op_log::mark_synced(conn, id))
    }

    fn mark_failed(
        &self,
        id: &OperationId,
        error: &str,
        next_eligible_at: DateTime<Utc>,
        terminal: bool,
    ) -> FieldsyncResult<()> {
        self.pool.with_writer(|conn| {
            queries::op_log::mark_failed(conn, id, error, next_eligible_at, terminal)
        })
    }

    fn dependents_of(&self, id: &OperationId) -> FieldsyncResult<Vec<OperationId>> {
        self.with_reader(|conn| queries::op_log::dependents_of(conn, id))
    }

    fn ops_for_target(&self, target: &EntityId) -> FieldsyncResult<Vec<PendingOperation>> {
        self.with_reader(|conn| queries::op_log::ops_for_target(conn, target))
    }

    fn remove_with_dependents(&self, id: &OperationId) -> FieldsyncResult<usize> {
        self.pool
            .with_writer(|conn| queries::op_log::remove_with_dependents(conn, id))
    }

    fn requeue_in_flight(&self) -> FieldsyncResult<usize> {
        self.pool
            .with_writer(queries::op_log::requeue_in_flight)
    }

    fn count_by_status(&self, status: OpStatus) -> FieldsyncResult<usize> {
        self.with_reader(|conn| queries::op_log::count_by_status(conn, status))
    }
}

impl IIdentityMap for StoreEngine {
    fn record_mapping(
        &self,
        temp: &TempId,
        remote: &RemoteId,
        entity_type: &str,
    ) -> FieldsyncResult<()> {
        self.pool.with_writer(|conn| {
            queries::id_map_ops::record_mapping(conn, temp, remote, entity_type)
        })
    }

    fn resolve(&self, temp: &TempId) -> FieldsyncResult<Option<RemoteId>> {
        self.with_reader(|conn| queries::id_map_ops::resolve(conn, temp))
    }

    fn reverse_resolve(&self, remote: &RemoteId) -> FieldsyncResult<Option<TempId>> {
        self.with_reader(|conn| queries::id_map_ops::reverse_resolve(conn, remote))
    }
}

impl IBlobStore for StoreEngine {
    fn put_blob(&self, record: &BlobRecord, bytes: &[u8]) -> FieldsyncResult<()> {
        self.pool
            .with_writer(|conn| queries::blob_ops::put_blob(conn, record, bytes))
    }

    fn get_blob(&self, id: &BlobId) -> FieldsyncResult<Option<BlobRecord>> {
        self.with_reader(|conn| queries::blob_ops::get_blob(conn, id))
    }

    fn blob_bytes(&self, id: &BlobId) -> FieldsyncResult<Option<Vec<u8>>> {
        self.with_reader(|conn| queries::blob_ops::blob_bytes(conn, id))
    }

    fn blobs_for_entity(&self, entity_id: &EntityId) -> FieldsyncResult<Vec<BlobRecord>> {
        self.with_reader(|conn| queries::blob_ops::blobs_for_entity(conn, entity_id))
    }

    fn release_uploaded(&self, id: &BlobId, remote_asset_id: &str) -> FieldsyncResult<()> {
        self.pool
            .with_writer(|conn| queries::blob_ops::release_uploaded(conn, id, remote_asset_id))
    }

    fn remove_blobs_for_entity(&self, entity_id: &EntityId) -> FieldsyncResult<usize> {
        self.pool
            .with_writer(|conn| queries::blob_ops::remove_blobs_for_entity(conn, entity_id))
    }
}

impl ICacheSlots for StoreEngine {
    fn put_slot(
        &self,
        service_id: &str,
        entity_type: &str,
        key: &str,
        value: &Value,
    ) -> FieldsyncResult<()> {
        self.pool.with_writer(|conn| {
            queries::cache_ops::put_slot(conn, service_id, entity_type, key, value)
        })
    }

    fn get_slot(
        &self,
        service_id: &str,
        entity_type: &str,
        key: &str,
    ) -> FieldsyncResult<Option<Value>> {
        self.with_reader(|conn| queries::cache_ops::get_slot(conn, service_id, entity_type, key))
    }

    fn remove_slot(&self, service_id: &str, entity_type: &str, key: &str) -> FieldsyncResult<()> {
        self.pool.with_writer(|conn| {
            queries::cache_ops::remove_slot(conn, service_id, entity_type, key)
        })
    }
}
