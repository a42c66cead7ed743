//! # fieldsync-store
//!
//! The Durable Local Store: SQLite persistence for entity records, the
//! pending operation log (with dependency edges), the identity resolution
//! table, blob storage, and keyed cache slots.
//!
//! Single serialized write connection plus a WAL read pool, the same shape
//! as any store where UI reads must never block behind sync writes.

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StoreEngine;

use fieldsync_core::errors::{FieldsyncError, StoreError};

/// Convert an sqlite-level failure into the workspace error type.
pub(crate) fn to_store_err(message: impl Into<String>) -> FieldsyncError {
    FieldsyncError::Store(StoreError::SqliteError {
        message: message.into(),
    })
}
