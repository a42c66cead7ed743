//! Keyed cache slots: arbitrary derived JSON state, scoped by
//! service/type/key. Consumers invalidate these on bus events; the store
//! itself attaches no sync semantics to them.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use fieldsync_core::errors::FieldsyncResult;

use crate::to_store_err;

pub fn put_slot(
    conn: &Connection,
    service_id: &str,
    entity_type: &str,
    key: &str,
    value: &Value,
) -> FieldsyncResult<()> {
    conn.execute(
        "INSERT INTO cache_slots (service_id, entity_type, slot_key, value, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(service_id, entity_type, slot_key) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
        params![
            service_id,
            entity_type,
            key,
            value.to_string(),
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn get_slot(
    conn: &Connection,
    service_id: &str,
    entity_type: &str,
    key: &str,
) -> FieldsyncResult<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM cache_slots
             WHERE service_id = ?1 AND entity_type = ?2 AND slot_key = ?3",
            params![service_id, entity_type, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| to_store_err(e.to_string())))
        .transpose()
}

pub fn remove_slot(
    conn: &Connection,
    service_id: &str,
    entity_type: &str,
    key: &str,
) -> FieldsyncResult<()> {
    conn.execute(
        "DELETE FROM cache_slots
         WHERE service_id = ?1 AND entity_type = ?2 AND slot_key = ?3",
        params![service_id, entity_type, key],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
