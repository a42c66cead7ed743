//! SyncService — the narrow boundary consumed by the UI/business layer.
//!
//! Every method here is synchronous against the durable local store and
//! performs zero network I/O; the background engine picks the work up
//! later. Deleting a never-synced entity withdraws its queued operations
//! instead of talking to the remote at all.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use fieldsync_core::blob::BlobRecord;
use fieldsync_core::config::SyncConfig;
use fieldsync_core::errors::{FieldsyncError, FieldsyncResult};
use fieldsync_core::id::{BlobId, EntityId, TempId};
use fieldsync_core::op::{OpKind, OpStatus, PendingOperation};
use fieldsync_core::record::EntityRecord;
use fieldsync_core::traits::{ILocalStore, RemoteClient};

use crate::allocator::TempIdAllocator;
use crate::bus::{InvalidationBus, InvalidationScope};
use crate::engine::SyncEngine;

#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn ILocalStore>,
    allocator: Arc<TempIdAllocator>,
    engine: SyncEngine,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn ILocalStore>,
        remote: Arc<dyn RemoteClient>,
        config: SyncConfig,
    ) -> Self {
        let bus = InvalidationBus::default();
        let engine = SyncEngine::new(store.clone(), remote, bus, config);
        Self {
            store,
            allocator: Arc::new(TempIdAllocator::new()),
            engine,
        }
    }

    /// Run crash recovery and start the background loop.
    pub fn start(&self, online: watch::Receiver<bool>) -> FieldsyncResult<JoinHandle<()>> {
        self.engine.recover()?;
        let engine = self.engine.clone();
        Ok(tokio::spawn(engine.run(online)))
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Create an entity locally. Durable before return; the CREATE is
    /// queued for the background engine.
    pub fn create_local(
        &self,
        entity_type: &str,
        service_id: &str,
        payload: Value,
    ) -> FieldsyncResult<TempId> {
        let temp = self.allocator.allocate(entity_type);
        self.create_local_with_id(temp.clone(), entity_type, service_id, payload)?;
        Ok(temp)
    }

    /// Create with a caller-supplied temp id. This is the resubmission
    /// path: a UI retry of the same logical intent reuses the id it
    /// already holds and is absorbed by the idempotency key.
    pub fn create_local_with_id(
        &self,
        temp: TempId,
        entity_type: &str,
        service_id: &str,
        payload: Value,
    ) -> FieldsyncResult<TempId> {
        let entity: EntityId = temp.clone().into();
        let record = EntityRecord::new(entity.clone(), entity_type, service_id, payload.clone());
        self.store.put_record(&record)?;

        let op = PendingOperation::new(OpKind::Create, entity, entity_type, service_id, payload);
        self.store.enqueue(&op)?;
        tracing::debug!(temp_id = %temp, entity_type, "created local entity");
        Ok(temp)
    }

    /// Apply a local edit and queue the matching remote UPDATE, ordered
    /// after every other queued operation for the entity.
    pub fn update_local(&self, entity_id: &EntityId, patch: Value) -> FieldsyncResult<()> {
        let (_, mut record) = self.lookup_record(entity_id)?;
        record.merge_payload(&patch);
        self.store.put_record(&record)?;

        let pending = self.pending_ops_for_entity(entity_id)?;
        let op = PendingOperation::new(
            OpKind::Update,
            record.entity_id.clone(),
            record.entity_type.clone(),
            record.service_id.clone(),
            patch,
        )
        .with_dependencies(pending.iter().map(|p| p.operation_id));
        self.store.enqueue(&op)?;
        Ok(())
    }

    /// Delete an entity locally.
    ///
    /// If its CREATE is still queued and undispatched, the create and all
    /// its dependents are withdrawn and no remote call will ever be made.
    /// Otherwise a DELETE is queued behind the entity's outstanding work.
    pub fn delete_local(&self, entity_id: &EntityId) -> FieldsyncResult<()> {
        let (key, record) = self.lookup_record(entity_id)?;
        let pending = self.pending_ops_for_entity(entity_id)?;

        if let Some(create) = pending
            .iter()
            .find(|op| op.kind == OpKind::Create && op.status == OpStatus::Pending)
        {
            let removed = self.store.remove_with_dependents(&create.operation_id)?;
            self.store.delete_record(&key)?;
            self.store.remove_blobs_for_entity(&key)?;
            tracing::debug!(entity_id = %key, removed, "withdrew never-synced entity");
            return Ok(());
        }

        let op = PendingOperation::new(
            OpKind::Delete,
            record.entity_id.clone(),
            record.entity_type.clone(),
            record.service_id.clone(),
            Value::Null,
        )
        .with_dependencies(pending.iter().map(|p| p.operation_id));
        self.store.enqueue(&op)?;
        Ok(())
    }

    /// Store photo bytes locally and queue their upload behind the owning
    /// entity's CREATE. Returns immediately; no network is touched.
    pub fn attach_blob(
        &self,
        entity_id: &EntityId,
        bytes: &[u8],
        content_type: &str,
        metadata: Value,
        thumbnail: Option<&[u8]>,
    ) -> FieldsyncResult<BlobId> {
        let (_, record) = self.lookup_record(entity_id)?;

        let thumbnail_id = match thumbnail {
            Some(thumb_bytes) => {
                let thumb =
                    BlobRecord::new(record.entity_id.clone(), content_type, thumb_bytes.len() as u64);
                self.store.put_blob(&thumb, thumb_bytes)?;
                Some(thumb.blob_id)
            }
            None => None,
        };

        let mut blob = BlobRecord::new(record.entity_id.clone(), content_type, bytes.len() as u64);
        if let Some(thumb_id) = thumbnail_id {
            blob = blob.with_thumbnail(thumb_id);
        }
        self.store.put_blob(&blob, bytes)?;

        let pending = self.pending_ops_for_entity(entity_id)?;
        let op = PendingOperation::new(
            OpKind::UploadBlob,
            record.entity_id.clone(),
            record.entity_type.clone(),
            record.service_id.clone(),
            metadata,
        )
        .with_blob(blob.blob_id)
        .with_dependencies(
            pending
                .iter()
                .filter(|p| p.kind == OpKind::Create)
                .map(|p| p.operation_id),
        );
        self.store.enqueue(&op)?;
        Ok(blob.blob_id)
    }

    /// Best-effort nudge to the background loop. Idempotent.
    pub fn trigger_sync(&self) {
        self.engine.trigger();
    }

    pub fn subscribe_invalidations(
        &self,
    ) -> tokio::sync::broadcast::Receiver<InvalidationScope> {
        self.engine.bus().subscribe()
    }

    pub fn subscribe_invalidations_filtered<F>(
        &self,
        predicate: F,
    ) -> mpsc::UnboundedReceiver<InvalidationScope>
    where
        F: Fn(&InvalidationScope) -> bool + Send + 'static,
    {
        self.engine.bus().subscribe_filtered(predicate)
    }

    /// Current best-known id: a mapped temp id resolves to its remote id,
    /// anything else comes back unchanged.
    pub fn resolve_id(&self, id: &EntityId) -> EntityId {
        self.engine.canonical_id(id)
    }

    /// Repair helper for callers holding a remote id whose dependent state
    /// still carries the temp id.
    pub fn reverse_resolve(&self, id: &EntityId) -> FieldsyncResult<Option<TempId>> {
        match id {
            EntityId::Remote(remote) => self.store.reverse_resolve(remote),
            EntityId::Temp(temp) => Ok(Some(temp.clone())),
        }
    }

    /// Every encoding the entity may be addressed by: the id as given plus
    /// its identity-map counterpart when a mapping exists. Operations queued
    /// before a create synced live under the temp encoding while the record
    /// has moved to the remote id, so both sides must always be consulted.
    fn encodings(&self, entity_id: &EntityId) -> FieldsyncResult<Vec<EntityId>> {
        let mut ids = vec![entity_id.clone()];
        let alternate = match entity_id {
            EntityId::Temp(temp) => self.store.resolve(temp)?.map(EntityId::Remote),
            EntityId::Remote(remote) => self.store.reverse_resolve(remote)?.map(EntityId::Temp),
        };
        ids.extend(alternate);
        Ok(ids)
    }

    /// Find the record under whichever encoding it currently lives.
    fn lookup_record(&self, entity_id: &EntityId) -> FieldsyncResult<(EntityId, EntityRecord)> {
        for id in self.encodings(entity_id)? {
            if let Some(record) = self.store.get_record(&id)? {
                return Ok((id, record));
            }
        }
        Err(FieldsyncError::UnknownEntity(entity_id.to_string()))
    }

    /// Non-terminal queued operations for an entity, under all of its
    /// encodings.
    fn pending_ops_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> FieldsyncResult<Vec<PendingOperation>> {
        let mut ops = Vec::new();
        for id in self.encodings(entity_id)? {
            ops.extend(self.store.ops_for_target(&id)?);
        }
        Ok(ops)
    }
}
