//! End-to-end flows through the `SyncService` facade: offline capture with
//! photo attachment, delete-before-sync withdrawal, resubmission dedup,
//! local edits, and identity resolution.

mod common;

use std::sync::atomic::Ordering;

use serde_json::json;

use common::{drain, setup, MockRemote};
use fieldsync_core::blob::BlobState;
use fieldsync_core::id::EntityId;
use fieldsync_core::op::{OpKind, OpStatus};
use fieldsync_core::record::RecordLifecycle;
use fieldsync_core::traits::{IBlobStore, IOperationLog, IRecordStore};

#[tokio::test]
async fn test_offline_capture_with_photo_syncs_later() {
    let remote = MockRemote::new();
    let (store, service) = setup(remote.clone());

    let temp = service
        .create_local("room", "svc1", json!({"name": "Kitchen", "floor": 2}))
        .unwrap();
    let entity: EntityId = temp.clone().into();
    let photo = vec![0xffu8; 4096];
    let thumb = vec![0xeeu8; 128];
    let blob_id = service
        .attach_blob(&entity, &photo, "image/jpeg", json!({"caption": "sink"}), Some(&thumb))
        .unwrap();

    // Everything so far was local; the remote has seen nothing.
    assert_eq!(remote.total_calls(), 0);
    let record = store.get_record(&entity).unwrap().unwrap();
    assert_eq!(record.lifecycle, RecordLifecycle::LocalOnly);

    drain(&service).await;

    // The temp id now maps to a server-issued remote id and the record
    // lives under it.
    let resolved = service.resolve_id(&entity);
    let remote_id = match &resolved {
        EntityId::Remote(r) => r.clone(),
        EntityId::Temp(_) => panic!("temp id should have been mapped"),
    };
    assert!(store.get_record(&entity).unwrap().is_none());
    let record = store.get_record(&resolved).unwrap().unwrap();
    assert!(record.sync_error.is_none());

    // The photo bytes were uploaded against the remote id and then purged
    // locally; the thumbnail and the remote asset handle survive.
    assert_eq!(remote.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote.upload_calls.load(Ordering::SeqCst), 1);
    let uploads = remote.uploaded.lock().unwrap();
    assert_eq!(uploads[0], (remote_id.as_str().to_string(), photo.len()));
    drop(uploads);

    let blob = store.get_blob(&blob_id).unwrap().unwrap();
    assert_eq!(blob.state, BlobState::Purged);
    assert_eq!(blob.remote_asset_id.as_deref(), Some(format!("asset-{remote_id}").as_str()));
    assert!(store.blob_bytes(&blob_id).unwrap().is_none());

    let thumb_id = blob.thumbnail.expect("thumbnail recorded");
    let thumb_blob = store.get_blob(&thumb_id).unwrap().unwrap();
    assert_eq!(thumb_blob.state, BlobState::Local);
    assert_eq!(store.blob_bytes(&thumb_id).unwrap().unwrap(), thumb);
}

#[tokio::test]
async fn test_delete_before_sync_never_touches_remote() {
    let remote = MockRemote::new();
    let (store, service) = setup(remote.clone());

    let temp = service
        .create_local("room", "svc1", json!({"name": "Hallway"}))
        .unwrap();
    let entity: EntityId = temp.into();
    service
        .attach_blob(&entity, &[1, 2, 3], "image/jpeg", json!({}), None)
        .unwrap();
    service.update_local(&entity, json!({"name": "Hall"})).unwrap();

    service.delete_local(&entity).unwrap();

    // The create and everything behind it were withdrawn.
    assert_eq!(store.count_by_status(OpStatus::Pending).unwrap(), 0);
    assert!(store.get_record(&entity).unwrap().is_none());
    assert!(store.blobs_for_entity(&entity).unwrap().is_empty());

    drain(&service).await;
    assert_eq!(remote.total_calls(), 0);
}

#[tokio::test]
async fn test_delete_after_sync_queues_remote_delete() {
    let remote = MockRemote::new();
    let (store, service) = setup(remote.clone());

    let temp = service
        .create_local("room", "svc1", json!({"name": "Attic"}))
        .unwrap();
    let entity: EntityId = temp.into();
    drain(&service).await;

    let resolved = service.resolve_id(&entity);
    service.delete_local(&resolved).unwrap();
    drain(&service).await;

    assert_eq!(remote.delete_calls.load(Ordering::SeqCst), 1);
    assert!(store.get_record(&resolved).unwrap().is_none());
}

#[tokio::test]
async fn test_delete_by_remote_id_orders_behind_pending_upload() {
    let remote = MockRemote::new();
    let (store, service) = setup(remote.clone());

    let temp = service
        .create_local("visual", "svc1", json!({"name": "Crack"}))
        .unwrap();
    let entity: EntityId = temp.into();
    service
        .attach_blob(&entity, &[1, 2, 3], "image/jpeg", json!({}), None)
        .unwrap();

    // One pass: the create syncs and the record moves to the remote id;
    // the upload is still queued under the temp encoding.
    service.engine().sync_once().await;
    let resolved = service.resolve_id(&entity);
    assert!(!resolved.is_temp());

    // A caller holding the remote id deletes. The DELETE must still see
    // the temp-encoded upload and queue behind it.
    service.delete_local(&resolved).unwrap();
    let delete = store
        .ops_for_target(&resolved)
        .unwrap()
        .into_iter()
        .find(|op| op.kind == OpKind::Delete)
        .expect("delete queued");
    let upload = store
        .ops_for_target(&entity)
        .unwrap()
        .into_iter()
        .find(|op| op.kind == OpKind::UploadBlob)
        .expect("upload still queued");
    assert!(delete.dependencies.contains(&upload.operation_id));

    // Next pass dispatches only the upload.
    service.engine().sync_once().await;
    assert_eq!(remote.upload_calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote.delete_calls.load(Ordering::SeqCst), 0);

    drain(&service).await;
    assert_eq!(remote.delete_calls.load(Ordering::SeqCst), 1);
    assert!(store.get_record(&resolved).unwrap().is_none());
}

#[tokio::test]
async fn test_blob_upload_leaves_record_lifecycle_alone() {
    let remote = MockRemote::new();
    let (store, service) = setup(remote.clone());

    let temp = service.create_local("visual", "svc1", json!({})).unwrap();
    let entity: EntityId = temp.into();
    drain(&service).await;
    let resolved = service.resolve_id(&entity);
    assert_eq!(
        store.get_record(&resolved).unwrap().unwrap().lifecycle,
        RecordLifecycle::Uploaded
    );

    // A blob attached after the create synced: its upload must not drag
    // the record back to uploading.
    service
        .attach_blob(&resolved, &[5u8; 16], "image/jpeg", json!({}), None)
        .unwrap();
    drain(&service).await;

    assert_eq!(remote.upload_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.get_record(&resolved).unwrap().unwrap().lifecycle,
        RecordLifecycle::Uploaded
    );
}

#[tokio::test]
async fn test_resubmitted_create_is_absorbed() {
    let remote = MockRemote::new();
    let (store, service) = setup(remote.clone());

    let temp = service
        .create_local("room", "svc1", json!({"name": "Porch"}))
        .unwrap();
    // The UI retries the same intent with the id it already holds.
    service
        .create_local_with_id(temp.clone(), "room", "svc1", json!({"name": "Porch"}))
        .unwrap();

    let entity: EntityId = temp.into();
    assert_eq!(store.ops_for_target(&entity).unwrap().len(), 1);

    drain(&service).await;
    assert_eq!(remote.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote.created.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_merges_locally_and_orders_behind_create() {
    let remote = MockRemote::new();
    let (store, service) = setup(remote.clone());

    let temp = service
        .create_local("room", "svc1", json!({"name": "Kitchen", "floor": 2}))
        .unwrap();
    let entity: EntityId = temp.into();
    service
        .update_local(&entity, json!({"name": "Galley", "note": "tight"}))
        .unwrap();

    // Shallow merge: edited and new fields land, untouched fields stay.
    let record = store.get_record(&entity).unwrap().unwrap();
    assert_eq!(record.payload["name"], "Galley");
    assert_eq!(record.payload["floor"], 2);
    assert_eq!(record.payload["note"], "tight");

    drain(&service).await;

    // The update went out against the remote id, after the create.
    assert_eq!(remote.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote.update_calls.load(Ordering::SeqCst), 1);
    let resolved = service.resolve_id(&entity);
    let record = store.get_record(&resolved).unwrap().unwrap();
    assert_eq!(record.lifecycle, RecordLifecycle::Verified);
}

#[tokio::test]
async fn test_update_accepts_either_id_encoding() {
    let remote = MockRemote::new();
    let (store, service) = setup(remote.clone());

    let temp = service
        .create_local("room", "svc1", json!({"name": "Den"}))
        .unwrap();
    let entity: EntityId = temp.into();
    drain(&service).await;

    // The record now lives under the remote id, but a stale caller still
    // holds the temp id.
    service.update_local(&entity, json!({"name": "Study"})).unwrap();
    drain(&service).await;

    let resolved = service.resolve_id(&entity);
    let record = store.get_record(&resolved).unwrap().unwrap();
    assert_eq!(record.payload["name"], "Study");
    assert_eq!(remote.update_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_resolve_and_reverse_resolve_round_trip() {
    let remote = MockRemote::new();
    let (_store, service) = setup(remote.clone());

    let temp = service
        .create_local("room", "svc1", json!({}))
        .unwrap();
    let entity: EntityId = temp.clone().into();

    // Unmapped ids come back unchanged.
    assert_eq!(service.resolve_id(&entity), entity);

    drain(&service).await;

    let resolved = service.resolve_id(&entity);
    assert!(!resolved.is_temp());
    let back = service.reverse_resolve(&resolved).unwrap();
    assert_eq!(back, Some(temp));
}

#[tokio::test]
async fn test_unknown_entity_is_an_error() {
    let remote = MockRemote::new();
    let (_store, service) = setup(remote);

    let ghost = EntityId::parse("temp_room_nobody_99");
    let err = service.update_local(&ghost, json!({"x": 1})).unwrap_err();
    assert!(err.to_string().contains("temp_room_nobody_99"));
}
