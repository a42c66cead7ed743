//! Pending operation construction and idempotency key derivation.

use fieldsync_core::id::{BlobId, EntityId, TempId};
use fieldsync_core::op::{idempotency_key, OpKind, OpStatus, PendingOperation};
use serde_json::json;

fn temp(counter: u64) -> EntityId {
    TempId::from_parts("room", "test", counter).into()
}

#[test]
fn test_idempotency_key_is_deterministic() {
    let payload = json!({"name": "Kitchen", "floor": 2});
    let a = idempotency_key(OpKind::Create, &temp(1), "room", "svc1", &payload, None);
    let b = idempotency_key(OpKind::Create, &temp(1), "room", "svc1", &payload, None);
    assert_eq!(a, b);
}

#[test]
fn test_idempotency_key_differs_by_content_and_target() {
    let payload = json!({"name": "Kitchen"});
    let base = idempotency_key(OpKind::Create, &temp(1), "room", "svc1", &payload, None);

    let other_target = idempotency_key(OpKind::Create, &temp(2), "room", "svc1", &payload, None);
    let other_payload = idempotency_key(
        OpKind::Create,
        &temp(1),
        "room",
        "svc1",
        &json!({"name": "Hall"}),
        None,
    );
    let other_kind = idempotency_key(OpKind::Update, &temp(1), "room", "svc1", &payload, None);

    assert_ne!(base, other_target);
    assert_ne!(base, other_payload);
    assert_ne!(base, other_kind);
}

#[test]
fn test_with_blob_rederives_key() {
    let op = PendingOperation::new(
        OpKind::UploadBlob,
        temp(1),
        "room",
        "svc1",
        json!({"content_type": "image/jpeg"}),
    );
    let without = op.idempotency_key.clone();
    let with = op.with_blob(BlobId::new()).idempotency_key;
    assert_ne!(without, with);
}

#[test]
fn test_new_operation_defaults() {
    let op = PendingOperation::new(OpKind::Create, temp(1), "room", "svc1", json!({}));
    assert_eq!(op.status, OpStatus::Pending);
    assert_eq!(op.attempt_count, 0);
    assert!(op.dependencies.is_empty());
    assert_eq!(op.priority, OpKind::Create.default_priority());
    assert!(op.next_eligible_at <= chrono::Utc::now());
}

#[test]
fn test_priority_bands_order_creates_first() {
    assert!(OpKind::Create.default_priority() > OpKind::Update.default_priority());
    assert!(OpKind::Update.default_priority() > OpKind::UploadBlob.default_priority());
}

#[test]
fn test_status_terminality() {
    assert!(OpStatus::Synced.is_terminal());
    assert!(OpStatus::Failed.is_terminal());
    assert!(!OpStatus::Pending.is_terminal());
    assert!(!OpStatus::InFlight.is_terminal());
}
