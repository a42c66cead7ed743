//! Error taxonomy: retryability classification and display formatting.

use fieldsync_core::errors::{FieldsyncError, RemoteError, StoreError};

#[test]
fn test_transient_is_retryable() {
    assert!(RemoteError::transient("connection reset").is_retryable());
    assert!(RemoteError::transient("gateway timeout").is_retryable());
}

#[test]
fn test_rejected_is_not_retryable() {
    assert!(!RemoteError::rejected(422, "parent visual no longer exists").is_retryable());
    assert!(!RemoteError::rejected(409, "conflict").is_retryable());
}

#[test]
fn test_error_messages_carry_context() {
    let err = RemoteError::rejected(422, "bad payload");
    assert_eq!(
        err.to_string(),
        "remote rejected request (status 422): bad payload"
    );

    let err = FieldsyncError::DependencyFailed {
        operation_id: "op-1".to_string(),
        reason: "parent create failed".to_string(),
    };
    assert!(err.to_string().contains("op-1"));
    assert!(err.to_string().contains("parent create failed"));
}

#[test]
fn test_store_error_wraps_into_top_level() {
    let err: FieldsyncError = StoreError::SqliteError {
        message: "disk I/O error".to_string(),
    }
    .into();
    assert!(matches!(err, FieldsyncError::Store(_)));
}
