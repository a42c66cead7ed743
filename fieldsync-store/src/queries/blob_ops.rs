//! Blob storage: bytes plus metadata, owned here until confirmed upload.

use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use fieldsync_core::blob::{BlobRecord, BlobState};
use fieldsync_core::errors::FieldsyncResult;
use fieldsync_core::id::{BlobId, EntityId};

use super::parse_ts;
use crate::to_store_err;

pub fn put_blob(conn: &Connection, record: &BlobRecord, bytes: &[u8]) -> FieldsyncResult<()> {
    conn.execute(
        "INSERT INTO blobs (
            blob_id, entity_id, content_type, byte_len, state, bytes,
            thumbnail_id, remote_asset_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.blob_id.to_string(),
            record.entity_id.to_string(),
            record.content_type,
            record.byte_len,
            record.state.as_str(),
            bytes,
            record.thumbnail.map(|t| t.to_string()),
            record.remote_asset_id,
            record.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn get_blob(conn: &Connection, id: &BlobId) -> FieldsyncResult<Option<BlobRecord>> {
    let row = conn
        .query_row(
            "SELECT blob_id, entity_id, content_type, byte_len, state,
                    thumbnail_id, remote_asset_id, created_at
             FROM blobs WHERE blob_id = ?1",
            params![id.to_string()],
            row_to_parts,
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;
    row.map(parts_to_blob).transpose()
}

pub fn blob_bytes(conn: &Connection, id: &BlobId) -> FieldsyncResult<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT bytes FROM blobs WHERE blob_id = ?1",
        params![id.to_string()],
        |row| row.get::<_, Option<Vec<u8>>>(0),
    )
    .optional()
    .map(Option::flatten)
    .map_err(|e| to_store_err(e.to_string()))
}

pub fn blobs_for_entity(
    conn: &Connection,
    entity_id: &EntityId,
) -> FieldsyncResult<Vec<BlobRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT blob_id, entity_id, content_type, byte_len, state,
                    thumbnail_id, remote_asset_id, created_at
             FROM blobs WHERE entity_id = ?1 ORDER BY created_at",
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![entity_id.to_string()], row_to_parts)
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut blobs = Vec::new();
    for row in rows {
        let parts = row.map_err(|e| to_store_err(e.to_string()))?;
        blobs.push(parts_to_blob(parts)?);
    }
    Ok(blobs)
}

/// Confirmed upload: store the remote asset id and reclaim the full bytes.
/// The metadata row and thumbnail reference stay behind for lookup.
pub fn release_uploaded(
    conn: &Connection,
    id: &BlobId,
    remote_asset_id: &str,
) -> FieldsyncResult<()> {
    conn.execute(
        "UPDATE blobs
         SET state = ?2, remote_asset_id = ?3, bytes = NULL
         WHERE blob_id = ?1",
        params![
            id.to_string(),
            BlobState::Purged.as_str(),
            remote_asset_id
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn remove_blobs_for_entity(conn: &Connection, entity_id: &EntityId) -> FieldsyncResult<usize> {
    conn.execute(
        "DELETE FROM blobs WHERE entity_id = ?1",
        params![entity_id.to_string()],
    )
    .map_err(|e| to_store_err(e.to_string()))
}

type BlobParts = (
    String,
    String,
    String,
    u64,
    String,
    Option<String>,
    Option<String>,
    String,
);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlobParts> {
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

fn parts_to_blob(parts: BlobParts) -> FieldsyncResult<BlobRecord> {
    let (blob_id, entity_id, content_type, byte_len, state, thumbnail, remote_asset_id, created) =
        parts;
    Ok(BlobRecord {
        blob_id: BlobId::from_str(&blob_id).map_err(|e| to_store_err(e.to_string()))?,
        entity_id: EntityId::parse(&entity_id),
        content_type,
        byte_len,
        state: BlobState::parse(&state)
            .ok_or_else(|| to_store_err(format!("unknown blob state {state:?}")))?,
        thumbnail: thumbnail
            .map(|t| BlobId::from_str(&t))
            .transpose()
            .map_err(|e| to_store_err(e.to_string()))?,
        remote_asset_id,
        created_at: parse_ts(&created)?,
    })
}
