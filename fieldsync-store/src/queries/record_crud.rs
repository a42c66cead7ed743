//! Entity record CRUD.

use rusqlite::{params, Connection, OptionalExtension};

use fieldsync_core::errors::FieldsyncResult;
use fieldsync_core::id::{EntityId, RemoteId, TempId};
use fieldsync_core::record::{EntityRecord, RecordLifecycle, SyncFailure};

use super::parse_ts;
use crate::to_store_err;

/// Insert or replace a record under its current canonical id.
pub fn put_record(conn: &Connection, record: &EntityRecord) -> FieldsyncResult<()> {
    let payload = record.payload.to_string();
    let sync_error = record
        .sync_error
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| to_store_err(e.to_string()))?;
    conn.execute(
        "INSERT INTO records (
            entity_id, entity_type, service_id, payload, lifecycle,
            sync_error, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(entity_id) DO UPDATE SET
            payload = excluded.payload,
            lifecycle = excluded.lifecycle,
            sync_error = excluded.sync_error,
            updated_at = excluded.updated_at",
        params![
            record.entity_id.to_string(),
            record.entity_type,
            record.service_id,
            payload,
            record.lifecycle.as_str(),
            sync_error,
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn get_record(conn: &Connection, entity_id: &EntityId) -> FieldsyncResult<Option<EntityRecord>> {
    let row = conn
        .query_row(
            "SELECT entity_id, entity_type, service_id, payload, lifecycle,
                    sync_error, created_at, updated_at
             FROM records WHERE entity_id = ?1",
            params![entity_id.to_string()],
            row_to_parts,
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;
    row.map(parts_to_record).transpose()
}

pub fn delete_record(conn: &Connection, entity_id: &EntityId) -> FieldsyncResult<()> {
    conn.execute(
        "DELETE FROM records WHERE entity_id = ?1",
        params![entity_id.to_string()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn list_records(
    conn: &Connection,
    service_id: &str,
    entity_type: &str,
) -> FieldsyncResult<Vec<EntityRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT entity_id, entity_type, service_id, payload, lifecycle,
                    sync_error, created_at, updated_at
             FROM records
             WHERE service_id = ?1 AND entity_type = ?2
             ORDER BY created_at",
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![service_id, entity_type], row_to_parts)
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut records = Vec::new();
    for row in rows {
        let parts = row.map_err(|e| to_store_err(e.to_string()))?;
        records.push(parts_to_record(parts)?);
    }
    Ok(records)
}

pub fn set_lifecycle(
    conn: &Connection,
    entity_id: &EntityId,
    lifecycle: RecordLifecycle,
) -> FieldsyncResult<()> {
    conn.execute(
        "UPDATE records SET lifecycle = ?2, updated_at = ?3 WHERE entity_id = ?1",
        params![
            entity_id.to_string(),
            lifecycle.as_str(),
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn flag_sync_error(
    conn: &Connection,
    entity_id: &EntityId,
    failure: &SyncFailure,
) -> FieldsyncResult<()> {
    let encoded = serde_json::to_string(failure).map_err(|e| to_store_err(e.to_string()))?;
    conn.execute(
        "UPDATE records SET sync_error = ?2, updated_at = ?3 WHERE entity_id = ?1",
        params![
            entity_id.to_string(),
            encoded,
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Rewrite the canonical id after a CREATE sync: the record row and every
/// blob owned by the entity move to the remote id.
pub fn rewrite_entity_id(
    conn: &Connection,
    temp: &TempId,
    remote: &RemoteId,
) -> FieldsyncResult<()> {
    conn.execute(
        "UPDATE records SET entity_id = ?2, updated_at = ?3 WHERE entity_id = ?1",
        params![
            temp.as_str(),
            remote.as_str(),
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    conn.execute(
        "UPDATE blobs SET entity_id = ?2 WHERE entity_id = ?1",
        params![temp.as_str(), remote.as_str()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

type RecordParts = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn parts_to_record(parts: RecordParts) -> FieldsyncResult<EntityRecord> {
    let (entity_id, entity_type, service_id, payload, lifecycle, sync_error, created, updated) =
        parts;
    Ok(EntityRecord {
        entity_id: EntityId::parse(&entity_id),
        entity_type,
        service_id,
        payload: serde_json::from_str(&payload).map_err(|e| to_store_err(e.to_string()))?,
        lifecycle: RecordLifecycle::parse(&lifecycle)
            .ok_or_else(|| to_store_err(format!("unknown lifecycle {lifecycle:?}")))?,
        sync_error: sync_error
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| to_store_err(e.to_string()))?,
        created_at: parse_ts(&created)?,
        updated_at: parse_ts(&updated)?,
    })
}
