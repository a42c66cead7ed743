//! v001: all core tables.
//!
//! Dependency edges live in their own table keyed by operation id, not by
//! object reference, so the graph survives process restart. `pending_ops`
//! uses an integer primary key as the creation-order sequence.

use rusqlite::Connection;

use fieldsync_core::errors::FieldsyncResult;

use crate::to_store_err;

pub fn apply(conn: &Connection) -> FieldsyncResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE records (
            entity_id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            service_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            lifecycle TEXT NOT NULL,
            sync_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX idx_records_scope ON records(service_id, entity_type);

        CREATE TABLE pending_ops (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            operation_id TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            target TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            service_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            blob_id TEXT,
            status TEXT NOT NULL,
            priority INTEGER NOT NULL,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            next_eligible_at TEXT NOT NULL,
            idempotency_key TEXT NOT NULL,
            last_error TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_ops_status ON pending_ops(status, next_eligible_at);
        CREATE INDEX idx_ops_idem ON pending_ops(idempotency_key);
        CREATE INDEX idx_ops_target ON pending_ops(target);

        CREATE TABLE op_deps (
            op_id TEXT NOT NULL,
            depends_on TEXT NOT NULL,
            PRIMARY KEY (op_id, depends_on)
        );
        CREATE INDEX idx_deps_on ON op_deps(depends_on);

        CREATE TABLE id_map (
            temp_id TEXT PRIMARY KEY,
            remote_id TEXT NOT NULL UNIQUE,
            entity_type TEXT NOT NULL,
            mapped_at TEXT NOT NULL
        );

        CREATE TABLE blobs (
            blob_id TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL,
            content_type TEXT NOT NULL,
            byte_len INTEGER NOT NULL,
            state TEXT NOT NULL,
            bytes BLOB,
            thumbnail_id TEXT,
            remote_asset_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_blobs_entity ON blobs(entity_id);

        CREATE TABLE cache_slots (
            service_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            slot_key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (service_id, entity_type, slot_key)
        );
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
