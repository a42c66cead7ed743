//! Durability across process restarts: a file-backed store reopened from
//! disk still holds records, queued operations with their dependency edges,
//! identity mappings, and blob bytes.

use serde_json::json;
use tempfile::TempDir;

use fieldsync_core::blob::BlobRecord;
use fieldsync_core::id::{EntityId, RemoteId, TempId};
use fieldsync_core::op::{OpKind, OpStatus, PendingOperation};
use fieldsync_core::record::EntityRecord;
use fieldsync_core::traits::{
    IBlobStore, ICacheSlots, IIdentityMap, IOperationLog, IRecordStore,
};
use fieldsync_store::StoreEngine;

#[test]
fn test_everything_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fieldsync.db");

    let entity: EntityId = TempId::from_parts("room", "test", 1).into();
    let (create_id, update_id, blob_id);
    {
        let store = StoreEngine::open(&path).unwrap();
        store
            .put_record(&EntityRecord::new(entity.clone(), "room", "svc1", json!({"n": 1})))
            .unwrap();

        let create =
            PendingOperation::new(OpKind::Create, entity.clone(), "room", "svc1", json!({"n": 1}));
        create_id = store.enqueue(&create).unwrap();
        let update = PendingOperation::new(
            OpKind::Update,
            entity.clone(),
            "room",
            "svc1",
            json!({"n": 2}),
        )
        .with_dependency(create_id);
        update_id = store.enqueue(&update).unwrap();

        let other = TempId::from_parts("room", "test", 9);
        store
            .record_mapping(&other, &RemoteId::new("1001"), "room")
            .unwrap();

        let blob = BlobRecord::new(entity.clone(), "image/jpeg", 3);
        blob_id = blob.blob_id;
        store.put_blob(&blob, &[7, 8, 9]).unwrap();

        store.put_slot("svc1", "room", "list", &json!(["a", "b"])).unwrap();
    }

    let store = StoreEngine::open(&path).unwrap();

    let record = store.get_record(&entity).unwrap().unwrap();
    assert_eq!(record.payload, json!({"n": 1}));

    let create = store.get_op(&create_id).unwrap().unwrap();
    assert_eq!(create.status, OpStatus::Pending);
    let update = store.get_op(&update_id).unwrap().unwrap();
    assert!(update.dependencies.contains(&create_id));

    let other = TempId::from_parts("room", "test", 9);
    assert_eq!(store.resolve(&other).unwrap(), Some(RemoteId::new("1001")));

    assert_eq!(store.blob_bytes(&blob_id).unwrap().unwrap(), vec![7, 8, 9]);
    assert_eq!(
        store.get_slot("svc1", "room", "list").unwrap(),
        Some(json!(["a", "b"]))
    );
}

#[test]
fn test_reopen_is_idempotent_on_migrations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fieldsync.db");
    for _ in 0..3 {
        let store = StoreEngine::open(&path).unwrap();
        drop(store);
    }
    let store = StoreEngine::open(&path).unwrap();
    assert!(store
        .get_record(&EntityId::parse("temp_room_test_1"))
        .unwrap()
        .is_none());
}

#[test]
fn test_interrupted_dispatch_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fieldsync.db");

    let entity: EntityId = TempId::from_parts("room", "test", 1).into();
    let op_id;
    {
        let store = StoreEngine::open(&path).unwrap();
        let op = PendingOperation::new(OpKind::Create, entity, "room", "svc1", json!({}));
        op_id = store.enqueue(&op).unwrap();
        store.mark_in_flight(&op_id).unwrap();
    }

    let store = StoreEngine::open(&path).unwrap();
    assert_eq!(store.get_op(&op_id).unwrap().unwrap().status, OpStatus::InFlight);
    assert_eq!(store.requeue_in_flight().unwrap(), 1);
    let op = store.get_op(&op_id).unwrap().unwrap();
    assert_eq!(op.status, OpStatus::Pending);
    assert_eq!(op.attempt_count, 1);
}
