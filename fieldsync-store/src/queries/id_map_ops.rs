//! The identity resolution table.
//!
//! Append-only and never purged: a stale temp-id reference can surface
//! arbitrarily long after the original sync, and this table is the single
//! authoritative place to repair it. Forward and reverse lookups are both
//! first-class.

use rusqlite::{params, Connection, OptionalExtension};

use fieldsync_core::errors::FieldsyncResult;
use fieldsync_core::id::{RemoteId, TempId};

use crate::to_store_err;

/// Record a mapping. Inserting the same temp id twice is ignored, so one
/// temp id maps to at most one remote id for the lifetime of the store.
pub fn record_mapping(
    conn: &Connection,
    temp: &TempId,
    remote: &RemoteId,
    entity_type: &str,
) -> FieldsyncResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO id_map (temp_id, remote_id, entity_type, mapped_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            temp.as_str(),
            remote.as_str(),
            entity_type,
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn resolve(conn: &Connection, temp: &TempId) -> FieldsyncResult<Option<RemoteId>> {
    conn.query_row(
        "SELECT remote_id FROM id_map WHERE temp_id = ?1",
        params![temp.as_str()],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map(|opt| opt.map(RemoteId::new))
    .map_err(|e| to_store_err(e.to_string()))
}

pub fn reverse_resolve(conn: &Connection, remote: &RemoteId) -> FieldsyncResult<Option<TempId>> {
    let raw = conn
        .query_row(
            "SELECT temp_id FROM id_map WHERE remote_id = ?1",
            params![remote.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;
    match raw {
        Some(encoded) => TempId::parse(&encoded)
            .map(Some)
            .ok_or_else(|| to_store_err(format!("id_map holds malformed temp id {encoded:?}"))),
        None => Ok(None),
    }
}
